//! Prediction history for charting.
//!
//! Three parallel sequences: actual prices, predicted prices and labels
//! (`Prediction N`, 1-based). Append-only, session-scoped, never persisted.

use serde::Serialize;

/// One `(actual, predicted, label)` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub actual: f64,
    pub predicted: f64,
    pub label: String,
}

/// Append-only parallel sequences consumed by the chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionHistory {
    actual: Vec<f64>,
    predicted: Vec<f64>,
    labels: Vec<String>,
}

impl PredictionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one triple and returns its label.
    pub fn push(&mut self, actual: f64, predicted: f64) -> &str {
        let label = format!("Prediction {}", self.labels.len() + 1);
        self.actual.push(actual);
        self.predicted.push(predicted);
        self.labels.push(label);
        &self.labels[self.labels.len() - 1]
    }

    pub fn actual(&self) -> &[f64] {
        &self.actual
    }

    pub fn predicted(&self) -> &[f64] {
        &self.predicted
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = HistoryEntry> + '_ {
        self.actual
            .iter()
            .zip(&self.predicted)
            .zip(&self.labels)
            .map(|((actual, predicted), label)| HistoryEntry {
                actual: *actual,
                predicted: *predicted,
                label: label.clone(),
            })
    }
}
