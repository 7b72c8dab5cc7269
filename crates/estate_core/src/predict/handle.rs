//! Background model initialization with a readiness state.
//!
//! # Responsibility
//! - Run `PriceModel::train_or_load` off the caller's thread.
//! - Let callers observe readiness and cancel a running training.
//!
//! # Invariants
//! - Predictions before readiness fail with `PredictionUnavailable`.
//! - The worker trains on a copy of the store taken at spawn time; later
//!   appends never reach the live model.
//! - State moves once from `Training` to a terminal state.

use crate::config::EstimatorConfig;
use crate::dataset::store::DatasetStore;
use crate::model::features::PropertyFeatures;
use crate::predict::model::{PriceEstimate, PriceModel, TrainOutcome};
use crate::predict::{ModelError, UnavailableReason};
use crate::repo::snapshot_repo::SnapshotStore;
use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

const WORKER_THREAD_NAME: &str = "estate-model-init";

/// Observable lifecycle of the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    Training,
    Ready,
    Cancelled,
    Failed(String),
}

impl ModelState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Ready => "ready",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

enum Slot {
    Training,
    Ready {
        model: Arc<PriceModel>,
        outcome: TrainOutcome,
    },
    Cancelled,
    Failed(ModelError),
}

struct Shared {
    slot: RwLock<Slot>,
    cancel: AtomicBool,
}

impl Shared {
    fn finish(&self, result: Result<(PriceModel, TrainOutcome), ModelError>) {
        let next = match result {
            Ok((model, outcome)) => {
                info!(
                    "event=model_init module=predict status=ok source={:?}",
                    outcome.source
                );
                Slot::Ready {
                    model: Arc::new(model),
                    outcome,
                }
            }
            Err(err) if err.is_cancelled() => {
                info!("event=model_init module=predict status=cancelled");
                Slot::Cancelled
            }
            Err(err) => {
                error!("event=model_init module=predict status=error error={err}");
                Slot::Failed(err)
            }
        };
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

/// Handle to a model that may still be initializing.
pub struct ModelHandle {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ModelHandle {
    /// Starts `train_or_load` on a worker thread.
    ///
    /// `store` is moved into the worker; pass a clone to keep appending.
    pub fn spawn(
        store: DatasetStore,
        snapshots: Arc<dyn SnapshotStore>,
        config: EstimatorConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            slot: RwLock::new(Slot::Training),
            cancel: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let spawned = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let result = PriceModel::train_or_load(
                    &store,
                    snapshots.as_ref(),
                    &config,
                    &worker_shared.cancel,
                );
                worker_shared.finish(result);
            });

        let worker = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                shared.finish(Err(ModelError::Persistence(format!(
                    "failed to start model worker: {err}"
                ))));
                None
            }
        };

        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    /// Runs `train_or_load` on the calling thread.
    pub fn blocking(
        store: &DatasetStore,
        snapshots: &dyn SnapshotStore,
        config: &EstimatorConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            slot: RwLock::new(Slot::Training),
            cancel: AtomicBool::new(false),
        });
        shared.finish(PriceModel::train_or_load(
            store,
            snapshots,
            config,
            &shared.cancel,
        ));
        Self {
            shared,
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ModelState {
        match &*self.read_slot() {
            Slot::Training => ModelState::Training,
            Slot::Ready { .. } => ModelState::Ready,
            Slot::Cancelled => ModelState::Cancelled,
            Slot::Failed(err) => ModelState::Failed(err.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.read_slot(), Slot::Ready { .. })
    }

    /// The active model once ready.
    pub fn model(&self) -> Option<Arc<PriceModel>> {
        match &*self.read_slot() {
            Slot::Ready { model, .. } => Some(Arc::clone(model)),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<TrainOutcome> {
        match &*self.read_slot() {
            Slot::Ready { outcome, .. } => Some(outcome.clone()),
            _ => None,
        }
    }

    /// The initialization error when the state is `Failed`.
    pub fn error(&self) -> Option<ModelError> {
        match &*self.read_slot() {
            Slot::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Estimates a price, or reports the model as not ready.
    pub fn predict(&self, features: &PropertyFeatures) -> Result<PriceEstimate, ModelError> {
        let model = self
            .model()
            .ok_or_else(|| ModelError::unavailable(UnavailableReason::ModelNotReady))?;
        model.predict(features)
    }

    /// Requests the worker to stop at the next iteration boundary.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Relaxed);
    }

    /// Blocks until the worker finishes and returns the final state.
    pub fn wait(&self) -> ModelState {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                self.shared.finish(Err(ModelError::Persistence(
                    "model worker panicked".to_string(),
                )));
            }
        }
        self.state()
    }

    fn read_slot(&self) -> std::sync::RwLockReadGuard<'_, Slot> {
        self.shared
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
