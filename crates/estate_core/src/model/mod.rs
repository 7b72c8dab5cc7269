//! Domain model for property records and prediction inputs.
//!
//! # Responsibility
//! - Define canonical data structures used by dataset and model logic.
//! - Own field-domain validation so every layer shares one rule set.
//!
//! # Invariants
//! - A `PropertyRecord` is only stored or trained on after `validate()`.
//! - Locations form a closed set; unknown names are rejected, never zeroed.

pub mod features;
pub mod record;
