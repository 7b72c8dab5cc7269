//! Price model: normalization, training, persistence and inference.
//!
//! # Responsibility
//! - Turn a dataset store into a trained network plus label range.
//! - Load and save that pair through a snapshot store.
//! - Serve price estimates and report when none can be produced.
//!
//! # Invariants
//! - Training and inference apply the exact same feature normalization.
//! - Inference never mutates the dataset or the weights.
//! - Only `DegenerateDataset` is fatal; every other failure is recoverable.

use crate::model::record::RecordValidationError;
use crate::nn::NetworkError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod handle;
pub mod model;
pub mod normalize;

/// Why a price estimate could not be produced.
#[derive(Debug, Clone, PartialEq)]
pub enum UnavailableReason {
    /// Model is still training, was cancelled or failed to initialize.
    ModelNotReady,
    /// Features are outside their domain.
    InvalidInput(RecordValidationError),
    /// The network produced no output or NaN.
    NonNumericOutput,
}

impl Display for UnavailableReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelNotReady => write!(f, "model is not ready"),
            Self::InvalidInput(err) => write!(f, "invalid input: {err}"),
            Self::NonNumericOutput => write!(f, "network output is not a number"),
        }
    }
}

/// Error taxonomy of the price model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A record or feature input is out of domain; caller re-prompts.
    Validation(RecordValidationError),
    /// Fewer than two distinct prices; normalization would divide by zero.
    DegenerateDataset { min_price: f64, max_price: f64 },
    /// Caller must fall back to manual price entry.
    PredictionUnavailable(UnavailableReason),
    /// Training stopped early or the network rejected its configuration.
    Training(NetworkError),
    /// Snapshot load/save or network state failure.
    Persistence(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DegenerateDataset {
                min_price,
                max_price,
            } => write!(
                f,
                "dataset needs at least two distinct prices (min={min_price}, max={max_price})"
            ),
            Self::PredictionUnavailable(reason) => write!(f, "prediction unavailable: {reason}"),
            Self::Training(err) => write!(f, "training failed: {err}"),
            Self::Persistence(message) => write!(f, "model persistence failed: {message}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Training(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RecordValidationError> for ModelError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<NetworkError> for ModelError {
    fn from(value: NetworkError) -> Self {
        Self::Training(value)
    }
}

impl ModelError {
    pub(crate) fn unavailable(reason: UnavailableReason) -> Self {
        Self::PredictionUnavailable(reason)
    }

    /// Whether this error means training was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Training(NetworkError::Cancelled { .. }))
    }
}
