//! Fully connected sigmoid network with online back-propagation.
//!
//! # Responsibility
//! - Run forward inference for one input vector.
//! - Train on labeled samples with learning rate, momentum, an iteration cap
//!   and an error threshold.
//!
//! # Invariants
//! - Every layer (hidden and output) uses the logistic sigmoid.
//! - Biases are updated without momentum.
//! - Training checks the cancellation flag once per iteration.

use crate::nn::init::{glorot_uniform, Lcg};
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};

/// Network construction, training or shape errors.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// Topology needs at least an input and an output layer, all non-empty.
    InvalidTopology(Vec<usize>),
    /// Vector length does not match the layer it feeds.
    ShapeMismatch { expected: usize, actual: usize },
    /// Stored weights disagree with declared sizes or are not finite.
    CorruptState(String),
    EmptyTrainingSet,
    Cancelled { iterations: usize },
}

impl Display for NetworkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTopology(sizes) => write!(f, "invalid network topology {sizes:?}"),
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "expected vector of length {expected}, got {actual}")
            }
            Self::CorruptState(message) => write!(f, "corrupt network state: {message}"),
            Self::EmptyTrainingSet => write!(f, "training set is empty"),
            Self::Cancelled { iterations } => {
                write!(f, "training cancelled after {iterations} iterations")
            }
        }
    }
}

impl Error for NetworkError {}

/// Hyperparameters of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    pub iterations: usize,
    pub learning_rate: f64,
    pub momentum: f64,
    pub error_threshold: f64,
    /// Log progress every `log_period` iterations; `0` disables.
    pub log_period: usize,
}

/// Result of a finished training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingStats {
    pub iterations: usize,
    /// Mean squared error of the last iteration.
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    /// Row `j` holds incoming weights of node `j`.
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

/// Feed-forward network; `sizes[0]` is the input width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedForward {
    sizes: Vec<usize>,
    layers: Vec<DenseLayer>,
}

impl FeedForward {
    /// Builds a network with Glorot-uniform weights and zero biases.
    pub fn new(sizes: &[usize], seed: Option<u64>) -> Result<Self, NetworkError> {
        if sizes.len() < 2 || sizes.contains(&0) {
            return Err(NetworkError::InvalidTopology(sizes.to_vec()));
        }

        let mut rng = Lcg::from_seed_or_clock(seed);
        let layers = sizes
            .windows(2)
            .map(|pair| DenseLayer {
                weights: glorot_uniform(pair[0], pair[1], &mut rng),
                biases: vec![0.0; pair[1]],
            })
            .collect();

        Ok(Self {
            sizes: sizes.to_vec(),
            layers,
        })
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn input_size(&self) -> usize {
        self.sizes[0]
    }

    /// Checks that weights agree with `sizes` and are all finite.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.sizes.len() < 2 || self.sizes.contains(&0) {
            return Err(NetworkError::InvalidTopology(self.sizes.clone()));
        }
        if self.layers.len() != self.sizes.len() - 1 {
            return Err(NetworkError::CorruptState(format!(
                "{} layers for {} sizes",
                self.layers.len(),
                self.sizes.len()
            )));
        }

        for (index, (layer, pair)) in self.layers.iter().zip(self.sizes.windows(2)).enumerate() {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            if layer.weights.len() != fan_out || layer.biases.len() != fan_out {
                return Err(NetworkError::CorruptState(format!(
                    "layer {index} has {} rows and {} biases, expected {fan_out}",
                    layer.weights.len(),
                    layer.biases.len()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != fan_in) {
                return Err(NetworkError::CorruptState(format!(
                    "layer {index} row width differs from {fan_in}"
                )));
            }
            let all_finite = layer
                .weights
                .iter()
                .flatten()
                .chain(layer.biases.iter())
                .all(|value| value.is_finite());
            if !all_finite {
                return Err(NetworkError::CorruptState(format!(
                    "layer {index} holds non-finite values"
                )));
            }
        }
        Ok(())
    }

    /// Runs forward inference and returns the output layer.
    pub fn run(&self, input: &[f64]) -> Result<Vec<f64>, NetworkError> {
        let mut activations = self.forward(input)?;
        Ok(activations.pop().unwrap_or_default())
    }

    /// Trains on `(input, target)` pairs until the error threshold, the
    /// iteration cap or cancellation.
    pub fn train(
        &mut self,
        samples: &[(Vec<f64>, Vec<f64>)],
        options: &TrainOptions,
        cancel: &AtomicBool,
    ) -> Result<TrainingStats, NetworkError> {
        if samples.is_empty() {
            return Err(NetworkError::EmptyTrainingSet);
        }
        let output_size = self.sizes[self.sizes.len() - 1];
        for (input, target) in samples {
            check_len(self.input_size(), input.len())?;
            check_len(output_size, target.len())?;
        }

        let mut changes: Vec<Vec<Vec<f64>>> = self
            .layers
            .iter()
            .map(|layer| {
                layer
                    .weights
                    .iter()
                    .map(|row| vec![0.0; row.len()])
                    .collect()
            })
            .collect();

        let mut stats = TrainingStats {
            iterations: 0,
            error: f64::INFINITY,
        };

        for iteration in 1..=options.iterations {
            if cancel.load(Ordering::Relaxed) {
                return Err(NetworkError::Cancelled {
                    iterations: stats.iterations,
                });
            }

            let mut error_sum = 0.0;
            for (input, target) in samples {
                error_sum += self.train_sample(input, target, options, &mut changes)?;
            }

            stats = TrainingStats {
                iterations: iteration,
                error: error_sum / samples.len() as f64,
            };

            if options.log_period > 0 && iteration % options.log_period == 0 {
                debug!(
                    "event=model_train module=nn status=progress iteration={} error={}",
                    iteration, stats.error
                );
            }
            if stats.error < options.error_threshold {
                break;
            }
        }

        debug!(
            "event=model_train module=nn status=done iterations={} error={}",
            stats.iterations, stats.error
        );
        Ok(stats)
    }

    /// One back-propagation step; returns the sample's mean squared error.
    fn train_sample(
        &mut self,
        input: &[f64],
        target: &[f64],
        options: &TrainOptions,
        changes: &mut [Vec<Vec<f64>>],
    ) -> Result<f64, NetworkError> {
        let activations = self.forward(input)?;
        let layer_count = self.layers.len();
        let mut deltas: Vec<Vec<f64>> = vec![Vec::new(); layer_count];

        let output = &activations[layer_count];
        let errors: Vec<f64> = target
            .iter()
            .zip(output)
            .map(|(expected, actual)| expected - actual)
            .collect();
        let sample_error =
            errors.iter().map(|error| error * error).sum::<f64>() / errors.len() as f64;
        deltas[layer_count - 1] = errors
            .iter()
            .zip(output)
            .map(|(error, out)| error * out * (1.0 - out))
            .collect();

        for layer in (0..layer_count - 1).rev() {
            let next = &self.layers[layer + 1];
            let outputs = &activations[layer + 1];
            let layer_deltas: Vec<f64> = outputs
                .iter()
                .enumerate()
                .map(|(node, out)| {
                    let propagated: f64 = next
                        .weights
                        .iter()
                        .zip(&deltas[layer + 1])
                        .map(|(row, delta)| delta * row[node])
                        .sum();
                    propagated * out * (1.0 - out)
                })
                .collect();
            deltas[layer] = layer_deltas;
        }

        for (index, layer) in self.layers.iter_mut().enumerate() {
            let incoming = &activations[index];
            for (node, delta) in deltas[index].iter().enumerate() {
                let row = &mut layer.weights[node];
                let row_changes = &mut changes[index][node];
                for (k, value) in incoming.iter().enumerate() {
                    let change =
                        options.learning_rate * delta * value + options.momentum * row_changes[k];
                    row_changes[k] = change;
                    row[k] += change;
                }
                layer.biases[node] += options.learning_rate * delta;
            }
        }

        Ok(sample_error)
    }

    /// Returns the activations of every layer, input first.
    fn forward(&self, input: &[f64]) -> Result<Vec<Vec<f64>>, NetworkError> {
        check_len(self.input_size(), input.len())?;

        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        for layer in &self.layers {
            let previous = &activations[activations.len() - 1];
            let next: Vec<f64> = layer
                .weights
                .iter()
                .zip(&layer.biases)
                .map(|(row, bias)| {
                    let sum: f64 = row.iter().zip(previous).map(|(w, x)| w * x).sum();
                    sigmoid(bias + sum)
                })
                .collect();
            activations.push(next);
        }
        Ok(activations)
    }
}

fn sigmoid(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}

fn check_len(expected: usize, actual: usize) -> Result<(), NetworkError> {
    if expected != actual {
        return Err(NetworkError::ShapeMismatch { expected, actual });
    }
    Ok(())
}
