//! Estimator use-case service.
//!
//! # Responsibility
//! - Orchestrate predict -> ground-truth lookup -> feedback -> append.
//! - Keep UI/FFI layers decoupled from model, dataset and storage details.
//!
//! # Invariants
//! - Appended records reach the dataset store (and record repository) but
//!   never the live model; they only affect a future fresh training.
//! - History grows once per prediction that obtained a ground truth.
//! - Store mutation goes through `&mut self`, so lookup-then-append cannot
//!   interleave with another append.

use crate::config::EstimatorConfig;
use crate::dataset::store::DatasetStore;
use crate::model::features::PropertyFeatures;
use crate::model::record::{PropertyRecord, RecordValidationError};
use crate::predict::handle::{ModelHandle, ModelState};
use crate::predict::model::PriceEstimate;
use crate::predict::{ModelError, UnavailableReason};
use crate::repo::record_repo::RecordRepository;
use crate::repo::snapshot_repo::SnapshotStore;
use crate::service::history::PredictionHistory;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    Model(ModelError),
    /// `submit_actual_price` was called without an unmatched prediction.
    NoPendingPrediction,
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model(err) => write!(f, "{err}"),
            Self::NoPendingPrediction => write!(f, "no prediction is awaiting an actual price"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::NoPendingPrediction => None,
        }
    }
}

impl From<ModelError> for ServiceError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<RecordValidationError> for ServiceError {
    fn from(value: RecordValidationError) -> Self {
        Self::Model(ModelError::Validation(value))
    }
}

/// Storage collaborators of the service.
#[derive(Clone)]
pub struct EstimatorDeps {
    pub snapshots: Arc<dyn SnapshotStore>,
    /// Persists user-supplied records across sessions when present.
    pub records: Option<Arc<dyn RecordRepository>>,
}

/// Prediction awaiting a user-supplied actual price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingFeedback {
    pub features: PropertyFeatures,
    /// `None` when the model could not produce an estimate.
    pub predicted: Option<f64>,
}

/// Outcome of one prediction request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub estimate: PriceEstimate,
    /// Ground truth from the dataset; `None` means the caller should ask.
    pub actual: Option<f64>,
}

/// Result of accepting a user-supplied actual price.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackReceipt {
    pub record: PropertyRecord,
    pub dataset_len: usize,
    /// Chart label when a history entry was added.
    pub history_label: Option<String>,
    /// Whether the record reached the record repository.
    pub persisted: bool,
}

/// Use-case service owning the dataset, model handle and history.
pub struct EstimatorService {
    store: DatasetStore,
    model: ModelHandle,
    deps: EstimatorDeps,
    snapshot_key: String,
    history: PredictionHistory,
    pending: Option<PendingFeedback>,
}

impl EstimatorService {
    /// Replays persisted records and starts model initialization on a worker.
    pub fn start(store: DatasetStore, deps: EstimatorDeps, config: EstimatorConfig) -> Self {
        let store = replay_persisted_records(store, &deps);
        let model = ModelHandle::spawn(store.clone(), Arc::clone(&deps.snapshots), config.clone());
        Self::with_model(store, model, deps, config)
    }

    /// Same as [`EstimatorService::start`] but initializes on this thread.
    ///
    /// # Errors
    /// - `DegenerateDataset` when training was required and impossible.
    pub fn start_blocking(
        store: DatasetStore,
        deps: EstimatorDeps,
        config: EstimatorConfig,
    ) -> ServiceResult<Self> {
        let store = replay_persisted_records(store, &deps);
        let model = ModelHandle::blocking(&store, deps.snapshots.as_ref(), &config);
        if let Some(err @ ModelError::DegenerateDataset { .. }) = model.error() {
            return Err(err.into());
        }
        Ok(Self::with_model(store, model, deps, config))
    }

    fn with_model(
        store: DatasetStore,
        model: ModelHandle,
        deps: EstimatorDeps,
        config: EstimatorConfig,
    ) -> Self {
        Self {
            store,
            model,
            deps,
            snapshot_key: config.snapshot_key,
            history: PredictionHistory::new(),
            pending: None,
        }
    }

    /// Predicts a price and looks up ground truth.
    ///
    /// A lookup hit is added to history; a miss leaves a pending feedback
    /// slot for [`EstimatorService::submit_actual_price`]. When the model
    /// cannot estimate but the features are valid and unknown to the dataset,
    /// a pending slot without a prediction is still opened so the caller can
    /// supply the price.
    pub fn predict(&mut self, features: &PropertyFeatures) -> ServiceResult<PredictionResult> {
        self.pending = None;

        let estimate = match self.model.predict(features) {
            Ok(estimate) => estimate,
            Err(err) => {
                let awaits_price = matches!(
                    &err,
                    ModelError::PredictionUnavailable(reason)
                        if !matches!(reason, UnavailableReason::InvalidInput(_))
                ) && self.store.find_actual_price(features).is_none();
                if awaits_price {
                    self.pending = Some(PendingFeedback {
                        features: *features,
                        predicted: None,
                    });
                }
                warn!(
                    "event=model_predict module=service status=unavailable pending={} error={}",
                    awaits_price, err
                );
                return Err(err.into());
            }
        };

        let actual = self.store.find_actual_price(features);
        match actual {
            Some(actual) => {
                self.history.push(actual, estimate.price_thousands);
            }
            None => {
                self.pending = Some(PendingFeedback {
                    features: *features,
                    predicted: Some(estimate.price_thousands),
                });
            }
        }
        info!(
            "event=model_predict module=service status=ok lookup={}",
            if actual.is_some() { "hit" } else { "miss" }
        );

        Ok(PredictionResult { estimate, actual })
    }

    /// First-match ground-truth lookup without predicting.
    pub fn lookup_actual(&self, features: &PropertyFeatures) -> Option<f64> {
        self.store.find_actual_price(features)
    }

    /// Accepts the actual price for the pending prediction.
    ///
    /// # Errors
    /// - `NoPendingPrediction` when nothing awaits a price.
    /// - `Validation` when `price_thousands <= 0`; the pending slot is kept.
    pub fn submit_actual_price(&mut self, price_thousands: f64) -> ServiceResult<FeedbackReceipt> {
        let pending = self.pending.ok_or(ServiceError::NoPendingPrediction)?;
        let record = pending.features.with_price(price_thousands)?;

        let persisted = self.append_to_stores(record.clone())?;
        self.pending = None;

        let history_label = pending
            .predicted
            .map(|predicted| self.history.push(price_thousands, predicted).to_string());
        info!(
            "event=feedback_submit module=service status=ok dataset_len={} history_len={}",
            self.store.len(),
            self.history.len()
        );

        Ok(FeedbackReceipt {
            record,
            dataset_len: self.store.len(),
            history_label,
            persisted,
        })
    }

    /// Appends a labeled record to the store and record repository.
    ///
    /// Returns whether the record was persisted.
    pub fn append_record(&mut self, record: PropertyRecord) -> ServiceResult<bool> {
        self.append_to_stores(record)
    }

    fn append_to_stores(&mut self, record: PropertyRecord) -> ServiceResult<bool> {
        self.store.append(record.clone())?;
        let Some(records) = &self.deps.records else {
            return Ok(false);
        };
        match records.append_record(&record) {
            Ok(_) => Ok(true),
            Err(err) => {
                error!(
                    "event=dataset_append module=service status=error persisted=false error={err}"
                );
                Ok(false)
            }
        }
    }

    /// Logs user feedback as opaque telemetry; never used by the model.
    pub fn record_feedback(&self, rating: Option<u8>, comments: &str) {
        info!(
            "event=user_feedback module=service status=ok rating={} comment_chars={}",
            rating.map_or_else(|| "none".to_string(), |value| value.to_string()),
            comments.chars().count()
        );
    }

    /// Deletes the persisted snapshot so the next session trains fresh.
    pub fn clear_snapshot(&self) -> ServiceResult<usize> {
        self.deps
            .snapshots
            .clear(&self.snapshot_key)
            .map_err(|err| ServiceError::Model(ModelError::Persistence(err.to_string())))
    }

    pub fn pending(&self) -> Option<&PendingFeedback> {
        self.pending.as_ref()
    }

    pub fn history(&self) -> &PredictionHistory {
        &self.history
    }

    pub fn dataset(&self) -> &DatasetStore {
        &self.store
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn model_state(&self) -> ModelState {
        self.model.state()
    }
}

fn replay_persisted_records(mut store: DatasetStore, deps: &EstimatorDeps) -> DatasetStore {
    let Some(records) = &deps.records else {
        return store;
    };
    match records.list_records() {
        Ok(persisted) => {
            let count = persisted.len();
            for record in persisted {
                if let Err(err) = store.append(record) {
                    warn!("event=dataset_replay module=service status=skip error={err}");
                }
            }
            info!(
                "event=dataset_replay module=service status=ok replayed={} dataset_len={}",
                count,
                store.len()
            );
        }
        Err(err) => {
            error!("event=dataset_replay module=service status=error error={err}");
        }
    }
    store
}
