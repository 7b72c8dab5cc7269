//! Prediction input model.
//!
//! # Responsibility
//! - Carry the five structural features of a property without a label.
//! - Parse raw form strings into numbers before they cross the core boundary.
//!
//! # Invariants
//! - Parsing never applies domain checks; `validate()` does.

use crate::model::record::{
    validate_feature_domains, Location, PropertyRecord, RecordValidationError,
};

/// Structural features used for lookup and inference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyFeatures {
    pub area_sqft: f64,
    pub bedrooms: f64,
    pub bathrooms: f64,
    pub age_years: f64,
    pub location: Location,
}

impl PropertyFeatures {
    /// Parses raw form field strings.
    ///
    /// # Errors
    /// - `Unparseable` when a numeric field is not a number.
    /// - `UnknownLocation` when `location` is outside the closed set.
    pub fn parse(
        area_sqft: &str,
        bedrooms: &str,
        bathrooms: &str,
        age_years: &str,
        location: &str,
    ) -> Result<Self, RecordValidationError> {
        Ok(Self {
            area_sqft: parse_number("area_sqft", area_sqft)?,
            bedrooms: parse_number("bedrooms", bedrooms)?,
            bathrooms: parse_number("bathrooms", bathrooms)?,
            age_years: parse_number("age_years", age_years)?,
            location: Location::parse(location)?,
        })
    }

    /// Checks the feature domains shared with `PropertyRecord`.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        validate_feature_domains(
            self.area_sqft,
            self.bedrooms,
            self.bathrooms,
            self.age_years,
        )
    }

    /// Builds a labeled record from these features.
    ///
    /// # Errors
    /// - Returns a validation error when features or price are out of domain.
    pub fn with_price(
        &self,
        price_thousands: f64,
    ) -> Result<PropertyRecord, RecordValidationError> {
        let record = PropertyRecord {
            area_sqft: self.area_sqft,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            age_years: self.age_years,
            location: self.location,
            price_thousands,
        };
        record.validate()?;
        Ok(record)
    }
}

impl From<&PropertyRecord> for PropertyFeatures {
    fn from(record: &PropertyRecord) -> Self {
        Self {
            area_sqft: record.area_sqft,
            bedrooms: record.bedrooms,
            bathrooms: record.bathrooms,
            age_years: record.age_years,
            location: record.location,
        }
    }
}

/// Parses one numeric form field.
pub fn parse_number(field: &'static str, raw: &str) -> Result<f64, RecordValidationError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| RecordValidationError::Unparseable {
            field,
            raw: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::PropertyFeatures;
    use crate::model::record::{Location, RecordValidationError};

    #[test]
    fn parse_trims_and_reads_all_fields() {
        let features = PropertyFeatures::parse(" 1500 ", "3", "2.5", "0", "rural").unwrap();
        assert_eq!(features.area_sqft, 1500.0);
        assert_eq!(features.bathrooms, 2.5);
        assert_eq!(features.location, Location::Rural);
    }

    #[test]
    fn parse_rejects_empty_numeric_field() {
        let err = PropertyFeatures::parse("", "3", "2", "1", "Rural").unwrap_err();
        assert!(matches!(
            err,
            RecordValidationError::Unparseable {
                field: "area_sqft",
                ..
            }
        ));
    }

    #[test]
    fn parse_keeps_out_of_domain_values_for_validate() {
        let features = PropertyFeatures::parse("-5", "3", "2", "1", "Rural").unwrap();
        assert!(features.validate().is_err());
    }

    #[test]
    fn with_price_rejects_non_positive_price() {
        let features = PropertyFeatures::parse("900", "2", "1", "4", "Downtown").unwrap();
        assert!(features.with_price(0.0).is_err());
        assert_eq!(features.with_price(250.0).unwrap().price_thousands, 250.0);
    }
}
