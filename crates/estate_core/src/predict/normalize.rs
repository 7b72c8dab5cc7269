//! Feature and label scaling.
//!
//! Numeric features are divided by fixed scales; location is one-hot; the
//! label is min-max scaled with the range of the training store.

use crate::config::INPUT_WIDTH;
use crate::model::features::PropertyFeatures;
use crate::model::record::PropertyRecord;
use crate::predict::ModelError;
use serde::{Deserialize, Serialize};

pub const AREA_SCALE: f64 = 5000.0;
pub const BEDROOMS_SCALE: f64 = 5.0;
pub const BATHROOMS_SCALE: f64 = 3.0;
pub const AGE_SCALE: f64 = 50.0;

/// Label range a model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParameters {
    pub min_price: f64,
    pub max_price: f64,
}

impl NormalizationParameters {
    /// # Errors
    /// - `DegenerateDataset` unless both bounds are finite and `max > min`.
    pub fn new(min_price: f64, max_price: f64) -> Result<Self, ModelError> {
        if !(min_price.is_finite() && max_price.is_finite() && max_price > min_price) {
            return Err(ModelError::DegenerateDataset {
                min_price,
                max_price,
            });
        }
        Ok(Self {
            min_price,
            max_price,
        })
    }

    pub fn range(&self) -> f64 {
        self.max_price - self.min_price
    }

    pub fn normalize_price(&self, price_thousands: f64) -> f64 {
        (price_thousands - self.min_price) / self.range()
    }

    pub fn denormalize_price(&self, normalized: f64) -> f64 {
        normalized * self.range() + self.min_price
    }
}

/// Scales features into the network input vector.
pub fn normalize_features(features: &PropertyFeatures) -> [f64; INPUT_WIDTH] {
    let [loc0, loc1, loc2] = features.location.one_hot();
    [
        features.area_sqft / AREA_SCALE,
        features.bedrooms / BEDROOMS_SCALE,
        features.bathrooms / BATHROOMS_SCALE,
        features.age_years / AGE_SCALE,
        loc0,
        loc1,
        loc2,
    ]
}

/// Builds one `(input, target)` training sample.
pub fn training_sample(
    record: &PropertyRecord,
    params: &NormalizationParameters,
) -> (Vec<f64>, Vec<f64>) {
    let input = normalize_features(&PropertyFeatures::from(record));
    (
        input.to_vec(),
        vec![params.normalize_price(record.price_thousands)],
    )
}
