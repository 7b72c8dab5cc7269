use estate_core::db::open_db_in_memory;
use estate_core::repo::snapshot_repo::StoredSnapshot;
use estate_core::repo::{share_connection, SharedConnection};
use estate_core::{
    DatasetStore, EstimatorConfig, EstimatorDeps, EstimatorService, Location,
    MemorySnapshotStore, ModelError, ModelSource, ModelState, PropertyFeatures, PropertyRecord,
    RecordRepository, RecordValidationError, RepoResult, ServiceError, SnapshotStore,
    SqliteRecordRepository, SqliteSnapshotStore, TrainingConfig, UnavailableReason,
};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

fn record(area: f64, bedrooms: f64, location: Location, price: f64) -> PropertyRecord {
    PropertyRecord {
        area_sqft: area,
        bedrooms,
        bathrooms: 1.0,
        age_years: 10.0,
        location,
        price_thousands: price,
    }
}

fn seed_store() -> DatasetStore {
    DatasetStore::from_records([
        record(1000.0, 2.0, Location::Downtown, 200.0),
        record(1500.0, 3.0, Location::Suburban, 300.0),
        record(2200.0, 4.0, Location::Rural, 260.0),
    ])
    .unwrap()
}

fn quick_config() -> EstimatorConfig {
    EstimatorConfig {
        training: TrainingConfig {
            iterations: 20,
            seed: Some(3),
            ..TrainingConfig::default()
        },
        ..EstimatorConfig::default()
    }
}

fn memory_deps() -> EstimatorDeps {
    EstimatorDeps {
        snapshots: Arc::new(MemorySnapshotStore::new()),
        records: None,
    }
}

fn sqlite_deps(conn: &SharedConnection) -> EstimatorDeps {
    EstimatorDeps {
        snapshots: Arc::new(SqliteSnapshotStore::new(Arc::clone(conn))),
        records: Some(Arc::new(SqliteRecordRepository::new(Arc::clone(conn)))),
    }
}

/// Holds the worker in `load_latest` until the test opens the gate.
struct GatedSnapshotStore {
    gate: Mutex<Receiver<()>>,
    inner: MemorySnapshotStore,
}

impl SnapshotStore for GatedSnapshotStore {
    fn load_latest(&self, slot_key: &str) -> RepoResult<Option<StoredSnapshot>> {
        let _ = self.gate.lock().unwrap().recv();
        self.inner.load_latest(slot_key)
    }

    fn save(&self, slot_key: &str, payload: &str) -> RepoResult<i64> {
        self.inner.save(slot_key, payload)
    }

    fn clear(&self, slot_key: &str) -> RepoResult<usize> {
        self.inner.clear(slot_key)
    }
}

fn gated_deps() -> (EstimatorDeps, Sender<()>) {
    let (open, gate) = channel();
    let deps = EstimatorDeps {
        snapshots: Arc::new(GatedSnapshotStore {
            gate: Mutex::new(gate),
            inner: MemorySnapshotStore::new(),
        }),
        records: None,
    };
    (deps, open)
}

fn unseen_features() -> PropertyFeatures {
    PropertyFeatures {
        area_sqft: 1750.0,
        bedrooms: 3.0,
        bathrooms: 2.0,
        age_years: 4.0,
        location: Location::Suburban,
    }
}

#[test]
fn lookup_miss_then_feedback_grows_store_and_history_by_one() {
    let mut service =
        EstimatorService::start_blocking(seed_store(), memory_deps(), quick_config()).unwrap();
    let before = service.dataset().len();

    let result = service.predict(&unseen_features()).unwrap();
    assert_eq!(result.actual, None);
    assert!(service.history().is_empty());
    let pending = service.pending().copied().unwrap();
    assert_eq!(pending.predicted, Some(result.estimate.price_thousands));

    let receipt = service.submit_actual_price(250.0).unwrap();
    assert_eq!(receipt.dataset_len, before + 1);
    assert_eq!(service.dataset().len(), before + 1);
    assert_eq!(service.history().len(), 1);
    assert_eq!(receipt.history_label.as_deref(), Some("Prediction 1"));
    assert_eq!(service.history().actual(), &[250.0]);
    assert_eq!(
        service.history().predicted(),
        &[result.estimate.price_thousands]
    );
    assert!(service.pending().is_none());
    assert!(!receipt.persisted);
}

#[test]
fn appended_ground_truth_answers_the_next_lookup() {
    let mut service =
        EstimatorService::start_blocking(seed_store(), memory_deps(), quick_config()).unwrap();
    service.predict(&unseen_features()).unwrap();
    service.submit_actual_price(250.0).unwrap();

    let again = service.predict(&unseen_features()).unwrap();
    assert_eq!(again.actual, Some(250.0));
    assert_eq!(service.history().len(), 2);
    assert_eq!(service.history().labels()[1], "Prediction 2");
    assert!(service.pending().is_none());
}

#[test]
fn lookup_hit_records_history_without_pending() {
    let mut service =
        EstimatorService::start_blocking(seed_store(), memory_deps(), quick_config()).unwrap();
    let features = PropertyFeatures::from(&seed_store().records()[1]);

    let result = service.predict(&features).unwrap();
    assert_eq!(result.actual, Some(300.0));
    assert_eq!(service.history().len(), 1);
    assert!(service.pending().is_none());
    assert!(matches!(
        service.submit_actual_price(310.0),
        Err(ServiceError::NoPendingPrediction)
    ));
}

#[test]
fn invalid_actual_price_keeps_pending_prediction() {
    let mut service =
        EstimatorService::start_blocking(seed_store(), memory_deps(), quick_config()).unwrap();
    service.predict(&unseen_features()).unwrap();

    let err = service.submit_actual_price(0.0).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Model(ModelError::Validation(RecordValidationError::NotPositive {
            field: "price_thousands",
            ..
        }))
    ));
    assert!(service.pending().is_some());
    assert_eq!(service.dataset().len(), 3);

    service.submit_actual_price(275.0).unwrap();
    assert_eq!(service.dataset().len(), 4);
}

#[test]
fn feedback_never_retrains_the_live_model() {
    let mut service =
        EstimatorService::start_blocking(seed_store(), memory_deps(), quick_config()).unwrap();
    let first = service.predict(&unseen_features()).unwrap();
    service.submit_actual_price(900.0).unwrap();

    let model = service.model().model().unwrap();
    assert_eq!(model.dataset_len(), 3);
    assert_eq!(model.normalization().max_price, 300.0);

    let second = service.predict(&unseen_features()).unwrap();
    assert_eq!(first.estimate, second.estimate);
}

#[test]
fn invalid_features_are_rejected_without_pending() {
    let mut service =
        EstimatorService::start_blocking(seed_store(), memory_deps(), quick_config()).unwrap();
    let mut features = unseen_features();
    features.area_sqft = -5.0;

    let err = service.predict(&features).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Model(ModelError::PredictionUnavailable(
            UnavailableReason::InvalidInput(_)
        ))
    ));
    assert!(service.pending().is_none());
}

#[test]
fn persisted_records_are_replayed_in_the_next_session() {
    let conn = share_connection(open_db_in_memory().unwrap());

    let mut first =
        EstimatorService::start_blocking(seed_store(), sqlite_deps(&conn), quick_config())
            .unwrap();
    first.predict(&unseen_features()).unwrap();
    let receipt = first.submit_actual_price(250.0).unwrap();
    assert!(receipt.persisted);
    drop(first);

    let records = SqliteRecordRepository::new(Arc::clone(&conn));
    assert_eq!(records.list_records().unwrap(), vec![receipt.record]);

    let mut second =
        EstimatorService::start_blocking(seed_store(), sqlite_deps(&conn), quick_config())
            .unwrap();
    assert_eq!(second.dataset().len(), 4);
    assert_eq!(second.lookup_actual(&unseen_features()), Some(250.0));
    assert!(second.history().is_empty());

    let result = second.predict(&unseen_features()).unwrap();
    assert_eq!(result.actual, Some(250.0));
}

#[test]
fn append_record_validates_and_persists() {
    let conn = share_connection(open_db_in_memory().unwrap());
    let mut service =
        EstimatorService::start_blocking(seed_store(), sqlite_deps(&conn), quick_config())
            .unwrap();

    let persisted = service
        .append_record(record(800.0, 1.0, Location::Downtown, 180.0))
        .unwrap();
    assert!(persisted);
    assert_eq!(service.dataset().len(), 4);

    let err = service
        .append_record(record(800.0, 0.0, Location::Downtown, 180.0))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Model(ModelError::Validation(_))));
    assert_eq!(service.dataset().len(), 4);
}

#[test]
fn clear_snapshot_forces_training_next_session() {
    let conn = share_connection(open_db_in_memory().unwrap());
    let mut first =
        EstimatorService::start_blocking(seed_store(), sqlite_deps(&conn), quick_config())
            .unwrap();
    first.predict(&unseen_features()).unwrap();
    first.submit_actual_price(900.0).unwrap();
    assert_eq!(first.clear_snapshot().unwrap(), 1);
    assert_eq!(first.clear_snapshot().unwrap(), 0);
    drop(first);

    let second =
        EstimatorService::start_blocking(seed_store(), sqlite_deps(&conn), quick_config())
            .unwrap();
    assert!(matches!(
        second.model().outcome().unwrap().source,
        ModelSource::Trained { .. }
    ));
    let model = second.model().model().unwrap();
    assert_eq!(model.dataset_len(), 4);
    assert_eq!(model.normalization().max_price, 900.0);
}

#[test]
fn kept_snapshot_ignores_records_appended_last_session() {
    let conn = share_connection(open_db_in_memory().unwrap());
    let mut first =
        EstimatorService::start_blocking(seed_store(), sqlite_deps(&conn), quick_config())
            .unwrap();
    first.predict(&unseen_features()).unwrap();
    first.submit_actual_price(900.0).unwrap();
    drop(first);

    let second =
        EstimatorService::start_blocking(seed_store(), sqlite_deps(&conn), quick_config())
            .unwrap();
    assert!(matches!(
        second.model().outcome().unwrap().source,
        ModelSource::Loaded { .. }
    ));
    assert_eq!(second.dataset().len(), 4);
    assert_eq!(second.model().model().unwrap().normalization().max_price, 300.0);
}

#[test]
fn not_ready_model_only_asks_for_prices_the_dataset_lacks() {
    let (deps, open) = gated_deps();
    let mut service = EstimatorService::start(seed_store(), deps, quick_config());
    assert_eq!(service.model_state(), ModelState::Training);

    let known = PropertyFeatures::from(&seed_store().records()[0]);
    let err = service.predict(&known).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Model(ModelError::PredictionUnavailable(
            UnavailableReason::ModelNotReady
        ))
    ));
    assert!(service.pending().is_none());
    assert!(matches!(
        service.submit_actual_price(222.0),
        Err(ServiceError::NoPendingPrediction)
    ));
    assert_eq!(service.dataset().len(), 3);

    assert!(service.predict(&unseen_features()).is_err());
    assert_eq!(service.pending().copied().unwrap().predicted, None);
    let receipt = service.submit_actual_price(250.0).unwrap();
    assert_eq!(receipt.dataset_len, 4);
    assert_eq!(receipt.history_label, None);
    assert!(service.history().is_empty());

    open.send(()).unwrap();
    assert_eq!(service.model().wait(), ModelState::Ready);
}

#[test]
fn start_blocking_rejects_degenerate_dataset() {
    let store = DatasetStore::from_records([record(1000.0, 2.0, Location::Downtown, 200.0)])
        .unwrap();
    let err = EstimatorService::start_blocking(store, memory_deps(), quick_config())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ServiceError::Model(ModelError::DegenerateDataset { .. })
    ));
}

#[test]
fn background_start_becomes_ready() {
    let mut service = EstimatorService::start(seed_store(), memory_deps(), quick_config());
    assert_eq!(service.model().wait(), ModelState::Ready);
    assert_eq!(service.model_state(), ModelState::Ready);
    assert!(service.predict(&unseen_features()).is_ok());
}

#[test]
fn user_feedback_is_logged_only() {
    let service =
        EstimatorService::start_blocking(seed_store(), memory_deps(), quick_config()).unwrap();
    service.record_feedback(Some(5), "accurate enough");
    service.record_feedback(None, "");
    assert!(service.history().is_empty());
    assert_eq!(service.dataset().len(), 3);
}
