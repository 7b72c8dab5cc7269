//! Feed-forward neural network used by the price model.
//!
//! # Responsibility
//! - Provide a fully connected sigmoid network with back-propagation.
//! - Serialize the complete network state as one opaque snapshot value.
//!
//! # Invariants
//! - Layer shapes always agree with `sizes`; deserialized networks are
//!   checked with `FeedForward::validate()` before use.
//! - Initialization is deterministic for a given seed.

mod init;
pub mod network;

pub use network::{FeedForward, NetworkError, TrainOptions, TrainingStats};
