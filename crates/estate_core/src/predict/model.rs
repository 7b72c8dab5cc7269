//! Trained price model and its snapshot contract.
//!
//! # Responsibility
//! - Train a fresh network from a dataset store.
//! - Load/save the network together with its label range.
//! - Produce price estimates from validated features.
//!
//! # Invariants
//! - A snapshot always carries the normalization it was trained with, so a
//!   loaded model never pairs with a different label range.
//! - Snapshot load failures degrade to fresh training; save failures leave
//!   the trained model usable.

use crate::config::{EstimatorConfig, SnapshotPolicy, TrainingConfig, INPUT_WIDTH};
use crate::dataset::store::DatasetStore;
use crate::model::features::PropertyFeatures;
use crate::nn::{FeedForward, TrainingStats};
use crate::predict::normalize::{normalize_features, training_sample, NormalizationParameters};
use crate::predict::{ModelError, UnavailableReason};
use crate::repo::snapshot_repo::SnapshotStore;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Bumped whenever the snapshot envelope changes shape.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Serialized form stored in the snapshot slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelSnapshot {
    format_version: u32,
    network: FeedForward,
    normalization: NormalizationParameters,
    dataset_fingerprint: String,
    dataset_len: usize,
}

/// Where the active model came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    Loaded { snapshot_version: i64 },
    Trained { iterations: usize, error: f64 },
}

/// Result of [`PriceModel::train_or_load`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutcome {
    pub source: ModelSource,
    /// Version written by this run; `None` when loaded or when saving failed.
    pub saved_version: Option<i64>,
    /// Save failure message; the model stays usable regardless.
    pub save_error: Option<String>,
}

/// Price estimate in thousands at full precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceEstimate {
    pub price_thousands: f64,
}

impl PriceEstimate {
    /// Price rounded to two decimals for display.
    pub fn rounded(&self) -> f64 {
        (self.price_thousands * 100.0).round() / 100.0
    }

    pub fn display(&self) -> String {
        format!("{:.2}", self.price_thousands)
    }
}

/// Network plus the label range it was trained with.
#[derive(Debug, Clone)]
pub struct PriceModel {
    network: FeedForward,
    normalization: NormalizationParameters,
    dataset_fingerprint: String,
    dataset_len: usize,
}

impl PriceModel {
    /// Trains a fresh model on every record of `store`.
    ///
    /// # Errors
    /// - `DegenerateDataset` when the store has fewer than two distinct prices.
    /// - `Training` when cancelled or the topology is invalid.
    pub fn train(
        store: &DatasetStore,
        config: &TrainingConfig,
        cancel: &AtomicBool,
    ) -> Result<(Self, TrainingStats), ModelError> {
        let normalization = store.price_range()?;
        let samples: Vec<_> = store
            .records()
            .iter()
            .map(|record| training_sample(record, &normalization))
            .collect();

        let mut network = FeedForward::new(&config.topology(), config.seed)?;
        let stats = network.train(&samples, &config.train_options(), cancel)?;

        let model = Self {
            network,
            normalization,
            dataset_fingerprint: store.fingerprint(),
            dataset_len: store.len(),
        };
        Ok((model, stats))
    }

    /// Loads the persisted snapshot or trains and persists a fresh model.
    ///
    /// # Side effects
    /// - Reads and possibly writes `config.snapshot_key`.
    /// - Emits `snapshot_load`, `model_train` and `snapshot_save` events.
    ///
    /// # Errors
    /// - `DegenerateDataset` (fatal) or `Training` from a fresh run. Snapshot
    ///   I/O failures never surface here.
    pub fn train_or_load(
        store: &DatasetStore,
        snapshots: &dyn SnapshotStore,
        config: &EstimatorConfig,
        cancel: &AtomicBool,
    ) -> Result<(Self, TrainOutcome), ModelError> {
        if let Some((model, snapshot_version)) = load_snapshot(store, snapshots, config) {
            return Ok((
                model,
                TrainOutcome {
                    source: ModelSource::Loaded { snapshot_version },
                    saved_version: None,
                    save_error: None,
                },
            ));
        }

        let started_at = Instant::now();
        info!(
            "event=model_train module=predict status=start records={}",
            store.len()
        );
        let (model, stats) = match Self::train(store, &config.training, cancel) {
            Ok(trained) => trained,
            Err(err) => {
                error!(
                    "event=model_train module=predict status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };
        info!(
            "event=model_train module=predict status=ok duration_ms={} iterations={} error={}",
            started_at.elapsed().as_millis(),
            stats.iterations,
            stats.error
        );

        let (saved_version, save_error) = match model.save(snapshots, &config.snapshot_key) {
            Ok(version) => (Some(version), None),
            Err(err) => (None, Some(err.to_string())),
        };

        Ok((
            model,
            TrainOutcome {
                source: ModelSource::Trained {
                    iterations: stats.iterations,
                    error: stats.error,
                },
                saved_version,
                save_error,
            },
        ))
    }

    /// Serializes and stores this model as the next snapshot version.
    pub fn save(&self, snapshots: &dyn SnapshotStore, slot_key: &str) -> Result<i64, ModelError> {
        let result = self
            .to_payload()
            .and_then(|payload| {
                snapshots
                    .save(slot_key, &payload)
                    .map_err(|err| ModelError::Persistence(err.to_string()))
            });
        match &result {
            Ok(version) => info!(
                "event=snapshot_save module=predict status=ok slot={} version={}",
                slot_key, version
            ),
            Err(err) => error!(
                "event=snapshot_save module=predict status=error slot={} error={}",
                slot_key, err
            ),
        }
        result
    }

    /// Rebuilds a model from a snapshot payload.
    ///
    /// # Errors
    /// - `Persistence` when the payload is malformed, from another format
    ///   version, or holds an inconsistent network.
    pub fn from_payload(payload: &str) -> Result<Self, ModelError> {
        let snapshot: ModelSnapshot = serde_json::from_str(payload)
            .map_err(|err| ModelError::Persistence(format!("malformed snapshot: {err}")))?;
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(ModelError::Persistence(format!(
                "unsupported snapshot format {}",
                snapshot.format_version
            )));
        }
        snapshot
            .network
            .validate()
            .map_err(|err| ModelError::Persistence(err.to_string()))?;
        if snapshot.network.input_size() != INPUT_WIDTH {
            return Err(ModelError::Persistence(format!(
                "snapshot expects {} inputs, features have {INPUT_WIDTH}",
                snapshot.network.input_size()
            )));
        }
        let normalization = NormalizationParameters::new(
            snapshot.normalization.min_price,
            snapshot.normalization.max_price,
        )
        .map_err(|err| ModelError::Persistence(err.to_string()))?;

        Ok(Self {
            network: snapshot.network,
            normalization,
            dataset_fingerprint: snapshot.dataset_fingerprint,
            dataset_len: snapshot.dataset_len,
        })
    }

    pub fn to_payload(&self) -> Result<String, ModelError> {
        let snapshot = ModelSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            network: self.network.clone(),
            normalization: self.normalization,
            dataset_fingerprint: self.dataset_fingerprint.clone(),
            dataset_len: self.dataset_len,
        };
        serde_json::to_string(&snapshot).map_err(|err| ModelError::Persistence(err.to_string()))
    }

    /// Estimates the price of `features`.
    ///
    /// # Errors
    /// - `PredictionUnavailable(InvalidInput)` for out-of-domain features.
    /// - `PredictionUnavailable(NonNumericOutput)` when the network yields no
    ///   finite number.
    pub fn predict(&self, features: &PropertyFeatures) -> Result<PriceEstimate, ModelError> {
        features
            .validate()
            .map_err(|err| ModelError::unavailable(UnavailableReason::InvalidInput(err)))?;

        let output = self
            .network
            .run(&normalize_features(features))
            .map_err(|_| ModelError::unavailable(UnavailableReason::NonNumericOutput))?;
        let normalized = match output.first() {
            Some(value) if value.is_finite() => *value,
            _ => return Err(ModelError::unavailable(UnavailableReason::NonNumericOutput)),
        };

        Ok(PriceEstimate {
            price_thousands: self.normalization.denormalize_price(normalized),
        })
    }

    pub fn normalization(&self) -> NormalizationParameters {
        self.normalization
    }

    /// Fingerprint of the dataset this model was trained on.
    pub fn dataset_fingerprint(&self) -> &str {
        &self.dataset_fingerprint
    }

    pub fn dataset_len(&self) -> usize {
        self.dataset_len
    }
}

/// Returns a usable snapshot model, or `None` when training is required.
fn load_snapshot(
    store: &DatasetStore,
    snapshots: &dyn SnapshotStore,
    config: &EstimatorConfig,
) -> Option<(PriceModel, i64)> {
    let slot = config.snapshot_key.as_str();
    let stored = match snapshots.load_latest(slot) {
        Ok(Some(stored)) => stored,
        Ok(None) => {
            info!("event=snapshot_load module=predict status=miss slot={slot}");
            return None;
        }
        Err(err) => {
            warn!("event=snapshot_load module=predict status=error slot={slot} error={err}");
            return None;
        }
    };

    let model = match PriceModel::from_payload(&stored.payload) {
        Ok(model) => model,
        Err(err) => {
            warn!(
                "event=snapshot_load module=predict status=error slot={slot} version={} error={err}",
                stored.version
            );
            return None;
        }
    };

    if config.snapshot_policy == SnapshotPolicy::RetrainOnChange
        && model.dataset_fingerprint != store.fingerprint()
    {
        info!(
            "event=snapshot_load module=predict status=stale slot={slot} version={} snapshot_records={} current_records={}",
            stored.version,
            model.dataset_len,
            store.len()
        );
        return None;
    }

    info!(
        "event=snapshot_load module=predict status=ok slot={slot} version={}",
        stored.version
    );
    Some((model, stored.version))
}
