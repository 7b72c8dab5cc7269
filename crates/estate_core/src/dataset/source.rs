//! JSON dataset source.
//!
//! # Responsibility
//! - Parse the flat list of labeled entries used as the static corpus.
//! - Expose the seed dataset compiled into the crate.
//!
//! # Invariants
//! - Entries use the external field names (`"Area (sq ft)"`, ...).
//! - A load either yields a fully validated store or fails; no partial loads.

use crate::dataset::store::DatasetStore;
use crate::model::record::PropertyRecord;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const BUNDLED_DATASET_JSON: &str = include_str!("../../data/real_estate_data.json");

/// Failures while reading a dataset source.
#[derive(Debug)]
pub enum DatasetSourceError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Entry at `index` is malformed or out of domain.
    InvalidEntry { index: usize, reason: String },
}

impl Display for DatasetSourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read dataset: {err}"),
            Self::Json(err) => write!(f, "dataset is not a JSON list: {err}"),
            Self::InvalidEntry { index, reason } => {
                write!(f, "dataset entry {index} is invalid: {reason}")
            }
        }
    }
}

impl Error for DatasetSourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::InvalidEntry { .. } => None,
        }
    }
}

impl From<std::io::Error> for DatasetSourceError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for DatasetSourceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Parses a JSON array of dataset entries into a store.
pub fn parse_dataset_json(json: &str) -> Result<DatasetStore, DatasetSourceError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut store = DatasetStore::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let record: PropertyRecord =
            serde_json::from_value(entry).map_err(|err| DatasetSourceError::InvalidEntry {
                index,
                reason: err.to_string(),
            })?;
        store
            .append(record)
            .map_err(|err| DatasetSourceError::InvalidEntry {
                index,
                reason: err.to_string(),
            })?;
    }

    Ok(store)
}

/// Reads and parses a dataset file.
///
/// # Side effects
/// - Emits `dataset_load` logging events with record count or error.
pub fn load_dataset_file(path: impl AsRef<Path>) -> Result<DatasetStore, DatasetSourceError> {
    let path = path.as_ref();
    let result = std::fs::read_to_string(path)
        .map_err(DatasetSourceError::from)
        .and_then(|json| parse_dataset_json(&json));

    match &result {
        Ok(store) => info!(
            "event=dataset_load module=dataset status=ok source=file records={}",
            store.len()
        ),
        Err(err) => error!(
            "event=dataset_load module=dataset status=error source=file path={} error={}",
            path.display(),
            err
        ),
    }
    result
}

/// Returns the seed dataset shipped with the crate.
pub fn bundled_dataset() -> Result<DatasetStore, DatasetSourceError> {
    parse_dataset_json(BUNDLED_DATASET_JSON)
}
