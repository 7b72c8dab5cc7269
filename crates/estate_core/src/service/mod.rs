//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate dataset, model and repository calls into use-case APIs.
//! - Keep UI/FFI layers decoupled from storage and training details.

pub mod estimator_service;
pub mod history;
