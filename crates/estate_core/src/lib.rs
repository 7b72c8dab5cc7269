//! Core domain logic for the real-estate price estimator.
//! This crate owns the dataset, the price model and the feedback loop;
//! the FFI layer only adapts calls and envelopes.

pub mod config;
pub mod dataset;
pub mod db;
pub mod logging;
pub mod model;
pub mod nn;
pub mod predict;
pub mod repo;
pub mod service;

pub use config::{EstimatorConfig, SnapshotPolicy, TrainingConfig};
pub use dataset::source::{bundled_dataset, load_dataset_file, DatasetSourceError};
pub use dataset::store::DatasetStore;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::features::PropertyFeatures;
pub use model::record::{Location, PropertyRecord, RecordValidationError};
pub use predict::handle::{ModelHandle, ModelState};
pub use predict::model::{ModelSource, PriceEstimate, PriceModel, TrainOutcome};
pub use predict::normalize::NormalizationParameters;
pub use predict::{ModelError, UnavailableReason};
pub use repo::record_repo::{RecordRepository, SqliteRecordRepository};
pub use repo::snapshot_repo::{MemorySnapshotStore, SnapshotStore, SqliteSnapshotStore};
pub use repo::{RepoError, RepoResult};
pub use service::estimator_service::{
    EstimatorDeps, EstimatorService, FeedbackReceipt, PendingFeedback, PredictionResult,
    ServiceError,
};
pub use service::history::{HistoryEntry, PredictionHistory};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
