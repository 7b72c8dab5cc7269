use estate_core::{
    bundled_dataset, DatasetStore, Location, PropertyFeatures, PropertyRecord,
    RecordValidationError,
};

fn record(area: f64, bedrooms: f64, location: Location, price: f64) -> PropertyRecord {
    PropertyRecord {
        area_sqft: area,
        bedrooms,
        bathrooms: 2.0,
        age_years: 12.0,
        location,
        price_thousands: price,
    }
}

#[test]
fn first_inserted_near_duplicate_wins_lookup() {
    let store = DatasetStore::from_records([
        record(1500.0, 3.0, Location::Suburban, 300.0),
        record(1505.0, 3.0, Location::Suburban, 999.0),
    ])
    .unwrap();

    let features = PropertyFeatures::from(&record(1504.0, 3.0, Location::Suburban, 1.0));
    assert_eq!(store.find_actual_price(&features), Some(300.0));
}

#[test]
fn append_rejects_zero_bedrooms_without_growing() {
    let mut store = DatasetStore::from_records([record(1500.0, 3.0, Location::Rural, 120.0)])
        .unwrap();

    let err = store
        .append(record(1200.0, 0.0, Location::Rural, 150.0))
        .unwrap_err();
    assert!(matches!(
        err,
        RecordValidationError::NotPositive {
            field: "bedrooms",
            ..
        }
    ));
    assert_eq!(store.len(), 1);
}

#[test]
fn identical_records_may_coexist() {
    let mut store = DatasetStore::new();
    store
        .append(record(900.0, 1.0, Location::Downtown, 210.0))
        .unwrap();
    store
        .append(record(900.0, 1.0, Location::Downtown, 210.0))
        .unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn every_bundled_price_lies_within_computed_range() {
    let store = bundled_dataset().unwrap();
    let range = store.price_range().unwrap();

    assert!(range.max_price > range.min_price);
    for record in store.records() {
        assert!(record.price_thousands >= range.min_price);
        assert!(record.price_thousands <= range.max_price);
        let normalized = range.normalize_price(record.price_thousands);
        assert!((0.0..=1.0).contains(&normalized));
    }
}

#[test]
fn range_follows_appended_records() {
    let mut store = DatasetStore::from_records([
        record(1000.0, 2.0, Location::Downtown, 200.0),
        record(1500.0, 3.0, Location::Suburban, 300.0),
    ])
    .unwrap();
    store
        .append(record(3000.0, 5.0, Location::Suburban, 650.0))
        .unwrap();

    let range = store.price_range().unwrap();
    assert_eq!(range.min_price, 200.0);
    assert_eq!(range.max_price, 650.0);
}
