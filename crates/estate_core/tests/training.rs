use estate_core::db::open_db_in_memory;
use estate_core::repo::share_connection;
use estate_core::repo::snapshot_repo::StoredSnapshot;
use estate_core::{
    DatasetStore, EstimatorConfig, Location, MemorySnapshotStore, ModelError, ModelHandle,
    ModelSource, ModelState, PriceModel, PropertyFeatures, PropertyRecord, RepoError, RepoResult,
    SnapshotPolicy, SnapshotStore, SqliteSnapshotStore, TrainingConfig, UnavailableReason,
};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

fn record(
    area: f64,
    bedrooms: f64,
    bathrooms: f64,
    age: f64,
    location: Location,
    price: f64,
) -> PropertyRecord {
    PropertyRecord {
        area_sqft: area,
        bedrooms,
        bathrooms,
        age_years: age,
        location,
        price_thousands: price,
    }
}

fn two_record_store() -> DatasetStore {
    DatasetStore::from_records([
        record(1000.0, 2.0, 1.0, 10.0, Location::Downtown, 200.0),
        record(1500.0, 3.0, 2.0, 5.0, Location::Suburban, 300.0),
    ])
    .unwrap()
}

fn quick_config() -> EstimatorConfig {
    EstimatorConfig {
        training: TrainingConfig {
            iterations: 25,
            seed: Some(7),
            ..TrainingConfig::default()
        },
        ..EstimatorConfig::default()
    }
}

fn not_cancelled() -> AtomicBool {
    AtomicBool::new(false)
}

struct FailingSnapshotStore;

impl SnapshotStore for FailingSnapshotStore {
    fn load_latest(&self, _slot_key: &str) -> RepoResult<Option<StoredSnapshot>> {
        Ok(None)
    }

    fn save(&self, _slot_key: &str, _payload: &str) -> RepoResult<i64> {
        Err(RepoError::InvalidData("disk full".to_string()))
    }

    fn clear(&self, _slot_key: &str) -> RepoResult<usize> {
        Ok(0)
    }
}

/// Blocks `load_latest` until the test opens the gate.
struct GatedSnapshotStore {
    gate: Mutex<Receiver<()>>,
    inner: MemorySnapshotStore,
}

impl GatedSnapshotStore {
    fn new() -> (Arc<Self>, Sender<()>) {
        let (open, gate) = channel();
        let store = Arc::new(Self {
            gate: Mutex::new(gate),
            inner: MemorySnapshotStore::new(),
        });
        (store, open)
    }
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

#[test]
fn two_record_dataset_predicts_closer_to_matching_price() {
    let store = two_record_store();
    let config = TrainingConfig {
        seed: Some(42),
        ..TrainingConfig::default()
    };

    let (model, stats) = PriceModel::train(&store, &config, &not_cancelled()).unwrap();
    assert!(stats.iterations > 0);

    let features = PropertyFeatures::from(&store.records()[0]);
    let predicted = model.predict(&features).unwrap().price_thousands;
    assert!(
        (predicted - 200.0).abs() < (predicted - 300.0).abs(),
        "predicted {predicted}"
    );
}

#[test]
fn fixed_seed_training_is_reproducible() {
    let store = two_record_store();
    let config = quick_config().training;
    let features = PropertyFeatures::from(&store.records()[1]);

    let (first, _) = PriceModel::train(&store, &config, &not_cancelled()).unwrap();
    let (second, _) = PriceModel::train(&store, &config, &not_cancelled()).unwrap();
    assert_eq!(
        first.predict(&features).unwrap(),
        second.predict(&features).unwrap()
    );
}

#[test]
fn snapshot_load_skips_training() {
    let store = two_record_store();
    let snapshots = SqliteSnapshotStore::new(share_connection(open_db_in_memory().unwrap()));
    let config = quick_config();

    let (trained, outcome) =
        PriceModel::train_or_load(&store, &snapshots, &config, &not_cancelled()).unwrap();
    assert!(matches!(outcome.source, ModelSource::Trained { iterations: 25, .. }));
    assert_eq!(outcome.saved_version, Some(1));

    let (loaded, outcome) =
        PriceModel::train_or_load(&store, &snapshots, &config, &not_cancelled()).unwrap();
    assert_eq!(
        outcome.source,
        ModelSource::Loaded {
            snapshot_version: 1
        }
    );
    assert_eq!(outcome.saved_version, None);

    let features = PropertyFeatures::from(&store.records()[0]);
    assert_eq!(
        trained.predict(&features).unwrap(),
        loaded.predict(&features).unwrap()
    );
    assert_eq!(loaded.normalization(), trained.normalization());
}

#[test]
fn snapshot_carries_its_own_label_range() {
    let snapshots = MemorySnapshotStore::new();
    let config = quick_config();
    PriceModel::train_or_load(&two_record_store(), &snapshots, &config, &not_cancelled())
        .unwrap();

    let mut grown = two_record_store();
    grown
        .append(record(4000.0, 5.0, 3.0, 1.0, Location::Downtown, 900.0))
        .unwrap();
    let (loaded, outcome) =
        PriceModel::train_or_load(&grown, &snapshots, &config, &not_cancelled()).unwrap();

    assert!(matches!(outcome.source, ModelSource::Loaded { .. }));
    assert_eq!(loaded.normalization().min_price, 200.0);
    assert_eq!(loaded.normalization().max_price, 300.0);
}

#[test]
fn malformed_snapshot_falls_back_to_training() {
    let store = two_record_store();
    let snapshots = MemorySnapshotStore::new();
    let config = quick_config();
    snapshots.save(&config.snapshot_key, "{not json").unwrap();

    let (model, outcome) =
        PriceModel::train_or_load(&store, &snapshots, &config, &not_cancelled()).unwrap();
    assert!(matches!(outcome.source, ModelSource::Trained { .. }));
    assert_eq!(outcome.saved_version, Some(2));
    assert!(model.predict(&PropertyFeatures::from(&store.records()[0])).is_ok());
}

#[test]
fn save_failure_keeps_trained_model_usable() {
    let store = two_record_store();

    let (model, outcome) =
        PriceModel::train_or_load(&store, &FailingSnapshotStore, &quick_config(), &not_cancelled())
            .unwrap();
    assert!(matches!(outcome.source, ModelSource::Trained { .. }));
    assert_eq!(outcome.saved_version, None);
    assert!(outcome.save_error.unwrap().contains("disk full"));

    let estimate = model
        .predict(&PropertyFeatures::from(&store.records()[1]))
        .unwrap();
    assert!(estimate.price_thousands.is_finite());
}

#[test]
fn retrain_on_change_policy_retrains_after_growth() {
    let snapshots = MemorySnapshotStore::new();
    let config = EstimatorConfig {
        snapshot_policy: SnapshotPolicy::RetrainOnChange,
        ..quick_config()
    };
    let mut store = two_record_store();
    PriceModel::train_or_load(&store, &snapshots, &config, &not_cancelled()).unwrap();

    let (_, unchanged) =
        PriceModel::train_or_load(&store, &snapshots, &config, &not_cancelled()).unwrap();
    assert!(matches!(unchanged.source, ModelSource::Loaded { .. }));

    store
        .append(record(1200.0, 2.0, 2.0, 3.0, Location::Rural, 150.0))
        .unwrap();
    let (model, grown) =
        PriceModel::train_or_load(&store, &snapshots, &config, &not_cancelled()).unwrap();
    assert!(matches!(grown.source, ModelSource::Trained { .. }));
    assert_eq!(grown.saved_version, Some(2));
    assert_eq!(model.dataset_len(), 3);
    assert_eq!(model.normalization().min_price, 150.0);
}

#[test]
fn degenerate_dataset_is_fatal() {
    let store = DatasetStore::from_records([
        record(1000.0, 2.0, 1.0, 10.0, Location::Downtown, 200.0),
        record(1800.0, 4.0, 2.0, 1.0, Location::Rural, 200.0),
    ])
    .unwrap();

    let err = PriceModel::train_or_load(
        &store,
        &MemorySnapshotStore::new(),
        &quick_config(),
        &not_cancelled(),
    )
    .unwrap_err();
    assert!(matches!(err, ModelError::DegenerateDataset { .. }));

    let err = PriceModel::train(&DatasetStore::new(), &quick_config().training, &not_cancelled())
        .unwrap_err();
    assert!(matches!(err, ModelError::DegenerateDataset { .. }));
}

#[test]
fn predict_is_unavailable_for_out_of_domain_features() {
    let store = two_record_store();
    let (model, _) = PriceModel::train(&store, &quick_config().training, &not_cancelled()).unwrap();

    let mut negative_area = PropertyFeatures::from(&store.records()[0]);
    negative_area.area_sqft = -5.0;
    let mut negative_age = PropertyFeatures::from(&store.records()[0]);
    negative_age.age_years = -1.0;

    for features in [negative_area, negative_age] {
        let err = model.predict(&features).unwrap_err();
        assert!(
            matches!(
                err,
                ModelError::PredictionUnavailable(UnavailableReason::InvalidInput(_))
            ),
            "{err}"
        );
    }
}

#[test]
fn handle_reports_not_ready_until_training_finishes() {
    let store = two_record_store();
    let features = PropertyFeatures::from(&store.records()[0]);
    let (snapshots, open) = GatedSnapshotStore::new();

    let handle = ModelHandle::spawn(store, snapshots, quick_config());
    assert_eq!(handle.state(), ModelState::Training);
    assert!(matches!(
        handle.predict(&features),
        Err(ModelError::PredictionUnavailable(
            UnavailableReason::ModelNotReady
        ))
    ));

    open.send(()).unwrap();
    assert_eq!(handle.wait(), ModelState::Ready);
    assert!(handle.is_ready());
    assert!(handle.predict(&features).is_ok());
    assert!(matches!(
        handle.outcome().unwrap().source,
        ModelSource::Trained { .. }
    ));
}

#[test]
fn cancelled_handle_never_becomes_ready() {
    let (snapshots, open) = GatedSnapshotStore::new();
    let handle = ModelHandle::spawn(two_record_store(), snapshots, quick_config());

    handle.cancel();
    open.send(()).unwrap();

    assert_eq!(handle.wait(), ModelState::Cancelled);
    assert!(handle.model().is_none());
}

#[test]
fn blocking_handle_surfaces_degenerate_dataset() {
    let store =
        DatasetStore::from_records([record(1000.0, 2.0, 1.0, 10.0, Location::Downtown, 200.0)])
            .unwrap();
    let handle = ModelHandle::blocking(&store, &MemorySnapshotStore::new(), &quick_config());

    assert_eq!(handle.state().label(), "failed");
    assert!(matches!(
        handle.error(),
        Some(ModelError::DegenerateDataset { .. })
    ));
}
