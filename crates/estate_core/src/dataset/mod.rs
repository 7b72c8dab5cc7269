//! Labeled dataset storage and dataset sources.
//!
//! # Responsibility
//! - Hold the in-memory training corpus for one process lifetime.
//! - Load corpus entries from the JSON dataset source.
//!
//! # Invariants
//! - The store grows only by validated appends and never shrinks.
//! - Lookup order is insertion order.

pub mod source;
pub mod store;
