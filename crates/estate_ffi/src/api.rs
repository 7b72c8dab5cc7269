//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the estimator flow (predict, lookup, feedback, history) to Dart
//!   via FRB.
//! - Translate core results into flat response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - One process-wide service; calls are serialized by its mutex, so a
//!   lookup followed by an append is never interleaved with another append.
//! - Form values cross the boundary as raw strings and are parsed in core.

use estate_core::db::open_db;
use estate_core::repo::share_connection;
use estate_core::{
    bundled_dataset, core_version as core_version_inner, init_logging as init_logging_inner,
    load_dataset_file, ping as ping_inner, DatasetStore, EstimatorConfig, EstimatorDeps,
    EstimatorService, MemorySnapshotStore, PropertyFeatures, PropertyRecord, RecordRepository,
    SnapshotStore, SqliteRecordRepository, SqliteSnapshotStore,
};
use log::{error, warn};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

static ESTIMATOR_CONFIG: OnceLock<EstimatorConfig> = OnceLock::new();
static ESTIMATOR: Mutex<Option<EstimatorService>> = Mutex::new(None);

const NOT_INITIALIZED: &str = "estimator is not initialized; call estimator_init first";

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Model readiness and dataset size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorStatusResponse {
    /// Whether the estimator has been started.
    pub initialized: bool,
    /// `training|ready|cancelled|failed`, or `uninitialized`.
    pub model_state: String,
    pub dataset_len: u32,
    pub history_len: u32,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

/// Result of a prediction or a ground-truth lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResponse {
    pub ok: bool,
    /// Full-precision estimate in thousands.
    pub price_thousands: Option<f64>,
    /// Estimate rounded to two decimals for display.
    pub price_display: Option<String>,
    /// Dataset ground truth when a matching record exists.
    pub actual_price: Option<f64>,
    /// Whether the UI should ask the user for the actual price.
    pub needs_actual_price: bool,
    pub message: String,
}

impl PredictionResponse {
    fn failure(message: impl Into<String>, needs_actual_price: bool) -> Self {
        Self {
            ok: false,
            price_thousands: None,
            price_display: None,
            actual_price: None,
            needs_actual_price,
            message: message.into(),
        }
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Dataset size after the action.
    pub dataset_len: u32,
    /// Chart label of a newly added history entry.
    pub history_label: Option<String>,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, dataset_len: usize) -> Self {
        Self {
            ok: true,
            dataset_len: saturating_u32(dataset_len),
            history_label: None,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            dataset_len: 0,
            history_label: None,
            message: message.into(),
        }
    }
}

/// Prediction history as three parallel sequences for the chart.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryResponse {
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub labels: Vec<String>,
}

/// Loads the dataset and starts model initialization in the background.
///
/// # FFI contract
/// - Sync call; training itself runs on a worker thread.
/// - Repeated calls return the status of the running estimator.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn estimator_init() -> EstimatorStatusResponse {
    let mut guard = lock_estimator();
    if let Some(service) = guard.as_ref() {
        return status_of(service, "Estimator already initialized.");
    }

    let config = resolve_config().clone();
    let store = match load_store(&config) {
        Ok(store) => store,
        Err(message) => {
            error!("event=estimator_init module=ffi status=error error={message}");
            return uninitialized_status(format!("estimator_init failed: {message}"));
        }
    };

    let service = EstimatorService::start(store, open_deps(&config), config);
    let response = status_of(&service, "Estimator started.");
    *guard = Some(service);
    response
}

/// Reports model readiness without blocking.
#[flutter_rust_bridge::frb(sync)]
pub fn estimator_status() -> EstimatorStatusResponse {
    match lock_estimator().as_ref() {
        Some(service) => status_of(service, "ok"),
        None => uninitialized_status(NOT_INITIALIZED),
    }
}

/// Predicts a price from raw form values and looks up ground truth.
///
/// # FFI contract
/// - `needs_actual_price = true` when no dataset record matches, including
///   when the model cannot estimate but the inputs are valid.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn predict_price(
    area_sqft: String,
    bedrooms: String,
    bathrooms: String,
    age_years: String,
    location: String,
) -> PredictionResponse {
    let features = match PropertyFeatures::parse(
        &area_sqft, &bedrooms, &bathrooms, &age_years, &location,
    ) {
        Ok(features) => features,
        Err(err) => return PredictionResponse::failure(format!("invalid input: {err}"), false),
    };

    with_service(
        |message| PredictionResponse::failure(message, false),
        |service| match service.predict(&features) {
            Ok(result) => PredictionResponse {
                ok: true,
                price_thousands: Some(result.estimate.price_thousands),
                price_display: Some(result.estimate.display()),
                actual_price: result.actual,
                needs_actual_price: result.actual.is_none(),
                message: match result.actual {
                    Some(_) => "Actual price found.".to_string(),
                    None => "No matching record; please enter the actual price.".to_string(),
                },
            },
            Err(err) => PredictionResponse::failure(
                format!("predict_price failed: {err}"),
                service.pending().is_some(),
            ),
        },
    )
}

/// Looks up the dataset price for raw form values without predicting.
#[flutter_rust_bridge::frb(sync)]
pub fn lookup_actual_price(
    area_sqft: String,
    bedrooms: String,
    bathrooms: String,
    age_years: String,
    location: String,
) -> PredictionResponse {
    let features = match PropertyFeatures::parse(
        &area_sqft, &bedrooms, &bathrooms, &age_years, &location,
    ) {
        Ok(features) => features,
        Err(err) => return PredictionResponse::failure(format!("invalid input: {err}"), false),
    };

    with_service(
        |message| PredictionResponse::failure(message, false),
        |service| {
            let actual = service.lookup_actual(&features);
            PredictionResponse {
                ok: true,
                price_thousands: None,
                price_display: None,
                actual_price: actual,
                needs_actual_price: actual.is_none(),
                message: if actual.is_some() {
                    "Actual price found.".to_string()
                } else {
                    "No matching record.".to_string()
                },
            }
        },
    )
}

/// Supplies the actual price for the last unmatched prediction.
///
/// # FFI contract
/// - Appends the record to the dataset for future sessions; the live model
///   is not retrained.
/// - Invalid prices keep the pending prediction so the UI can re-prompt.
#[flutter_rust_bridge::frb(sync)]
pub fn submit_actual_price(price_thousands: String) -> ActionResponse {
    let parsed = estate_core::model::features::parse_number("price_thousands", &price_thousands);
    let price = match parsed {
        Ok(price) => price,
        Err(err) => return ActionResponse::failure(format!("invalid input: {err}")),
    };

    with_service(|message| ActionResponse::failure(message), |service| {
        match service.submit_actual_price(price) {
            Ok(receipt) => ActionResponse {
                ok: true,
                dataset_len: saturating_u32(receipt.dataset_len),
                history_label: receipt.history_label,
                message: if receipt.persisted {
                    "Actual price recorded.".to_string()
                } else {
                    "Actual price recorded for this session only.".to_string()
                },
            },
            Err(err) => ActionResponse::failure(format!("submit_actual_price failed: {err}")),
        }
    })
}

/// Appends a labeled record from raw form values.
#[flutter_rust_bridge::frb(sync)]
pub fn append_record(
    area_sqft: String,
    bedrooms: String,
    bathrooms: String,
    age_years: String,
    location: String,
    price_thousands: String,
) -> ActionResponse {
    let record = match parse_record(
        &area_sqft,
        &bedrooms,
        &bathrooms,
        &age_years,
        &location,
        &price_thousands,
    ) {
        Ok(record) => record,
        Err(message) => return ActionResponse::failure(format!("invalid input: {message}")),
    };

    with_service(|message| ActionResponse::failure(message), |service| {
        match service.append_record(record) {
            Ok(_) => ActionResponse::success("Record appended.", service.dataset().len()),
            Err(err) => ActionResponse::failure(format!("append_record failed: {err}")),
        }
    })
}

/// Returns the session's prediction history.
#[flutter_rust_bridge::frb(sync)]
pub fn prediction_history() -> HistoryResponse {
    let guard = lock_estimator();
    match guard.as_ref() {
        Some(service) => {
            let history = service.history();
            HistoryResponse {
                actual: history.actual().to_vec(),
                predicted: history.predicted().to_vec(),
                labels: history.labels().to_vec(),
            }
        }
        None => HistoryResponse {
            actual: Vec::new(),
            predicted: Vec::new(),
            labels: Vec::new(),
        },
    }
}

/// Records an optional 1..=5 rating and free-text comments as telemetry.
#[flutter_rust_bridge::frb(sync)]
pub fn submit_feedback(rating: Option<u8>, comments: String) -> ActionResponse {
    if matches!(rating, Some(value) if !(1..=5).contains(&value)) {
        return ActionResponse::failure("rating must be between 1 and 5");
    }
    with_service(|message| ActionResponse::failure(message), |service| {
        service.record_feedback(rating, &comments);
        ActionResponse::success("Thank you for your feedback.", service.dataset().len())
    })
}

/// Deletes the persisted model so the next session trains from scratch.
#[flutter_rust_bridge::frb(sync)]
pub fn clear_model_snapshot() -> ActionResponse {
    with_service(|message| ActionResponse::failure(message), |service| {
        match service.clear_snapshot() {
            Ok(removed) => ActionResponse::success(
                format!("Removed {removed} snapshot version(s)."),
                service.dataset().len(),
            ),
            Err(err) => ActionResponse::failure(format!("clear_model_snapshot failed: {err}")),
        }
    })
}

fn resolve_config() -> &'static EstimatorConfig {
    ESTIMATOR_CONFIG.get_or_init(EstimatorConfig::from_env)
}

fn lock_estimator() -> MutexGuard<'static, Option<EstimatorService>> {
    ESTIMATOR.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_service<T>(
    not_initialized: impl FnOnce(String) -> T,
    f: impl FnOnce(&mut EstimatorService) -> T,
) -> T {
    match lock_estimator().as_mut() {
        Some(service) => f(service),
        None => not_initialized(NOT_INITIALIZED.to_string()),
    }
}

fn load_store(config: &EstimatorConfig) -> Result<DatasetStore, String> {
    let loaded = match &config.dataset_path {
        Some(path) => load_dataset_file(path),
        None => bundled_dataset(),
    };
    loaded.map_err(|err| err.to_string())
}

/// SQLite-backed storage, or in-memory snapshots when the DB cannot open.
fn open_deps(config: &EstimatorConfig) -> EstimatorDeps {
    match open_db(&config.db_path) {
        Ok(conn) => {
            let conn = share_connection(conn);
            let snapshots: Arc<dyn SnapshotStore> =
                Arc::new(SqliteSnapshotStore::new(Arc::clone(&conn)));
            let records: Arc<dyn RecordRepository> = Arc::new(SqliteRecordRepository::new(conn));
            EstimatorDeps {
                snapshots,
                records: Some(records),
            }
        }
        Err(err) => {
            warn!(
                "event=estimator_init module=ffi status=fallback storage=memory error={err}"
            );
            EstimatorDeps {
                snapshots: Arc::new(MemorySnapshotStore::new()),
                records: None,
            }
        }
    }
}

fn parse_record(
    area_sqft: &str,
    bedrooms: &str,
    bathrooms: &str,
    age_years: &str,
    location: &str,
    price_thousands: &str,
) -> Result<PropertyRecord, String> {
    let features = PropertyFeatures::parse(area_sqft, bedrooms, bathrooms, age_years, location)
        .map_err(|err| err.to_string())?;
    let price = estate_core::model::features::parse_number("price_thousands", price_thousands)
        .map_err(|err| err.to_string())?;
    features.with_price(price).map_err(|err| err.to_string())
}

fn status_of(service: &EstimatorService, message: &str) -> EstimatorStatusResponse {
    let state = service.model_state();
    let message = match service.model().error() {
        Some(err) => err.to_string(),
        None => message.to_string(),
    };
    EstimatorStatusResponse {
        initialized: true,
        model_state: state.label().to_string(),
        dataset_len: saturating_u32(service.dataset().len()),
        history_len: saturating_u32(service.history().len()),
        message,
    }
}

fn uninitialized_status(message: impl Into<String>) -> EstimatorStatusResponse {
    EstimatorStatusResponse {
        initialized: false,
        model_state: "uninitialized".to_string(),
        dataset_len: 0,
        history_len: 0,
        message: message.into(),
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
