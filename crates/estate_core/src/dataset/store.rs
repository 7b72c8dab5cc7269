//! In-memory dataset store.
//!
//! # Responsibility
//! - Own the ordered collection of labeled property records.
//! - Answer first-match ground-truth lookups.
//! - Derive the label range used for normalization.
//!
//! # Invariants
//! - Every stored record passed `PropertyRecord::validate()`.
//! - Records are never edited or removed; earlier records shadow later
//!   duplicates for lookup.

use crate::model::features::PropertyFeatures;
use crate::model::record::{PropertyRecord, RecordValidationError};
use crate::predict::normalize::NormalizationParameters;
use crate::predict::ModelError;
use log::debug;
use sha2::{Digest, Sha256};

/// Area difference (sq ft) under which two properties are considered equal.
pub const AREA_MATCH_TOLERANCE_SQFT: f64 = 10.0;

/// Ordered, append-only collection of labeled records.
#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    records: Vec<PropertyRecord>,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from records, validating each in order.
    ///
    /// # Errors
    /// - Returns the first validation failure; no partial store is returned.
    pub fn from_records(
        records: impl IntoIterator<Item = PropertyRecord>,
    ) -> Result<Self, RecordValidationError> {
        let mut store = Self::new();
        for record in records {
            store.append(record)?;
        }
        Ok(store)
    }

    /// Appends one record after domain validation.
    ///
    /// Identical records may coexist.
    pub fn append(&mut self, record: PropertyRecord) -> Result<(), RecordValidationError> {
        record.validate()?;
        self.records.push(record);
        debug!(
            "event=dataset_append module=dataset status=ok len={}",
            self.records.len()
        );
        Ok(())
    }

    /// Returns the price of the first record matching `features`.
    ///
    /// A record matches when its area is within
    /// [`AREA_MATCH_TOLERANCE_SQFT`] and bedrooms, bathrooms, age and
    /// location are equal.
    pub fn find_actual_price(&self, features: &PropertyFeatures) -> Option<f64> {
        self.records
            .iter()
            .find(|record| matches_features(record, features))
            .map(|record| record.price_thousands)
    }

    /// Computes the label range over all records.
    ///
    /// # Errors
    /// - `ModelError::DegenerateDataset` when fewer than two distinct prices
    ///   exist.
    pub fn price_range(&self) -> Result<NormalizationParameters, ModelError> {
        let mut prices = self.records.iter().map(|record| record.price_thousands);
        let Some(first) = prices.next() else {
            return Err(ModelError::DegenerateDataset {
                min_price: f64::NAN,
                max_price: f64::NAN,
            });
        };
        let (min_price, max_price) =
            prices.fold((first, first), |(min, max), price| (min.min(price), max.max(price)));
        NormalizationParameters::new(min_price, max_price)
    }

    /// Hex SHA-256 digest over all records in insertion order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            hasher.update(record.area_sqft.to_bits().to_le_bytes());
            hasher.update(record.bedrooms.to_bits().to_le_bytes());
            hasher.update(record.bathrooms.to_bits().to_le_bytes());
            hasher.update(record.age_years.to_bits().to_le_bytes());
            hasher.update(record.location.as_str().as_bytes());
            hasher.update(record.price_thousands.to_bits().to_le_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    pub fn records(&self) -> &[PropertyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn matches_features(record: &PropertyRecord, features: &PropertyFeatures) -> bool {
    (record.area_sqft - features.area_sqft).abs() < AREA_MATCH_TOLERANCE_SQFT
        && record.bedrooms == features.bedrooms
        && record.bathrooms == features.bathrooms
        && record.age_years == features.age_years
        && record.location == features.location
}
