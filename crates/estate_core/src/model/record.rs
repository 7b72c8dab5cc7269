//! Property record domain model.
//!
//! # Responsibility
//! - Define the labeled record shared by the dataset store and training.
//! - Validate field domains before a record is stored or trained on.
//!
//! # Invariants
//! - `area_sqft`, `bedrooms`, `bathrooms` and `price_thousands` are `> 0`.
//! - `age_years` is `>= 0`.
//! - Every numeric field is finite.
//!
//! # See also
//! - `dataset::source` for the external JSON field names.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Location category of a property.
///
/// Serialized with the capitalized names used by the dataset source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Location {
    Downtown,
    Suburban,
    Rural,
}

impl Location {
    /// All locations in embedding order.
    pub const ALL: [Location; 3] = [Location::Downtown, Location::Suburban, Location::Rural];

    /// Parses a location name, ignoring case and surrounding whitespace.
    pub fn parse(value: &str) -> Result<Self, RecordValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "downtown" => Ok(Self::Downtown),
            "suburban" => Ok(Self::Suburban),
            "rural" => Ok(Self::Rural),
            _ => Err(RecordValidationError::UnknownLocation(value.to_string())),
        }
    }

    /// Canonical display name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downtown => "Downtown",
            Self::Suburban => "Suburban",
            Self::Rural => "Rural",
        }
    }

    /// One-hot embedding fed to the network.
    pub fn one_hot(self) -> [f64; 3] {
        match self {
            Self::Downtown => [1.0, 0.0, 0.0],
            Self::Suburban => [0.0, 1.0, 0.0],
            Self::Rural => [0.0, 0.0, 1.0],
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Location {
    type Error = RecordValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Validation failures for records and prediction inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValidationError {
    /// Field must be strictly greater than zero.
    NotPositive { field: &'static str, value: f64 },
    /// Field must be zero or greater.
    Negative { field: &'static str, value: f64 },
    /// Field is NaN or infinite.
    NotFinite { field: &'static str },
    /// Raw form input could not be parsed as a number.
    Unparseable { field: &'static str, raw: String },
    /// Location is outside the closed set.
    UnknownLocation(String),
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{field} must be greater than 0, got {value}")
            }
            Self::Negative { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
            Self::NotFinite { field } => write!(f, "{field} must be a finite number"),
            Self::Unparseable { field, raw } => {
                write!(f, "{field} is not a number: `{raw}`")
            }
            Self::UnknownLocation(value) => write!(
                f,
                "unknown location `{value}`; expected Downtown|Suburban|Rural"
            ),
        }
    }
}

impl Error for RecordValidationError {}

/// Labeled training record.
///
/// Field names are renamed to match the dataset source schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    #[serde(rename = "Area (sq ft)")]
    pub area_sqft: f64,
    #[serde(rename = "Bedrooms")]
    pub bedrooms: f64,
    #[serde(rename = "Bathrooms")]
    pub bathrooms: f64,
    #[serde(rename = "Age of Property (years)")]
    pub age_years: f64,
    #[serde(rename = "Location")]
    pub location: Location,
    /// Sale price in thousands.
    #[serde(rename = "Price (in $1000)")]
    pub price_thousands: f64,
}

impl PropertyRecord {
    /// Validates every field domain.
    ///
    /// # Errors
    /// - Returns the first violated field constraint.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        validate_feature_domains(
            self.area_sqft,
            self.bedrooms,
            self.bathrooms,
            self.age_years,
        )?;
        require_positive("price_thousands", self.price_thousands)
    }
}

/// Shared domain check for the four numeric features.
pub(crate) fn validate_feature_domains(
    area_sqft: f64,
    bedrooms: f64,
    bathrooms: f64,
    age_years: f64,
) -> Result<(), RecordValidationError> {
    require_positive("area_sqft", area_sqft)?;
    require_positive("bedrooms", bedrooms)?;
    require_positive("bathrooms", bathrooms)?;
    if !age_years.is_finite() {
        return Err(RecordValidationError::NotFinite { field: "age_years" });
    }
    if age_years < 0.0 {
        return Err(RecordValidationError::Negative {
            field: "age_years",
            value: age_years,
        });
    }
    Ok(())
}

pub(crate) fn require_positive(
    field: &'static str,
    value: f64,
) -> Result<(), RecordValidationError> {
    if !value.is_finite() {
        return Err(RecordValidationError::NotFinite { field });
    }
    if value <= 0.0 {
        return Err(RecordValidationError::NotPositive { field, value });
    }
    Ok(())
}
