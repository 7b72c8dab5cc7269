//! Estimator configuration.
//!
//! # Responsibility
//! - Hold training hyperparameters and snapshot policy with defaults.
//! - Resolve host overrides from `ESTATE_*` environment variables.
//!
//! # Invariants
//! - Defaults reproduce the reference topology and hyperparameters.
//! - Unknown environment values fall back to defaults and are logged.

use crate::nn::TrainOptions;
use crate::repo::snapshot_repo::PRICE_MODEL_SLOT;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the SQLite file.
pub const ENV_DB_PATH: &str = "ESTATE_DB_PATH";
/// Environment variable naming an optional JSON dataset file.
pub const ENV_DATASET_PATH: &str = "ESTATE_DATASET_PATH";
/// Environment variable selecting `trust` or `retrain_on_change`.
pub const ENV_SNAPSHOT_POLICY: &str = "ESTATE_SNAPSHOT_POLICY";

const DEFAULT_DB_FILE_NAME: &str = "estate_model.sqlite3";

/// Number of input features: four scaled numerics plus a 3-wide one-hot.
pub const INPUT_WIDTH: usize = 7;

/// Network and optimizer settings for a fresh training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub hidden_layers: Vec<usize>,
    pub iterations: usize,
    pub learning_rate: f64,
    pub momentum: f64,
    pub error_threshold: f64,
    /// Fixed initialization seed; `None` seeds from the clock.
    pub seed: Option<u64>,
    pub log_period: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![20, 15, 10],
            iterations: 10_000,
            learning_rate: 0.01,
            momentum: 0.1,
            error_threshold: 0.0001,
            seed: None,
            log_period: 1_000,
        }
    }
}

impl TrainingConfig {
    /// Full layer sizes including the input and the single output.
    pub fn topology(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(INPUT_WIDTH);
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(1);
        sizes
    }

    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            iterations: self.iterations,
            learning_rate: self.learning_rate,
            momentum: self.momentum,
            error_threshold: self.error_threshold,
            log_period: self.log_period,
        }
    }
}

/// What to do when a persisted snapshot exists at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPolicy {
    /// Use the snapshot verbatim even if the dataset has grown since.
    #[default]
    Trust,
    /// Retrain when the snapshot's dataset fingerprint differs.
    RetrainOnChange,
}

impl SnapshotPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trust" => Some(Self::Trust),
            "retrain_on_change" => Some(Self::RetrainOnChange),
            _ => None,
        }
    }
}

/// Complete estimator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub training: TrainingConfig,
    pub snapshot_policy: SnapshotPolicy,
    pub snapshot_key: String,
    pub db_path: PathBuf,
    /// JSON dataset replacing the bundled one when set.
    pub dataset_path: Option<PathBuf>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            training: TrainingConfig::default(),
            snapshot_policy: SnapshotPolicy::default(),
            snapshot_key: PRICE_MODEL_SLOT.to_string(),
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            dataset_path: None,
        }
    }
}

impl EstimatorConfig {
    /// Defaults overridden by `ESTATE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EstimatorConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = non_empty(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty(ENV_DATASET_PATH) {
            config.dataset_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = non_empty(ENV_SNAPSHOT_POLICY) {
            match SnapshotPolicy::parse(&raw) {
                Some(policy) => config.snapshot_policy = policy,
                None => warn!(
                    "event=config_load module=config status=fallback key={} value={}",
                    ENV_SNAPSHOT_POLICY, raw
                ),
            }
        }
        config
    }
}
