//! Persistence for records supplied at runtime.
//!
//! # Responsibility
//! - Keep user-provided ground-truth records across sessions.
//! - Replay them in insertion order so they extend the static corpus.
//!
//! # Invariants
//! - Write paths call `PropertyRecord::validate()` before SQL mutations.
//! - Read paths re-validate rows and reject corrupt ones.

use crate::model::record::{Location, PropertyRecord};
use crate::repo::{lock, RepoError, RepoResult, SharedConnection};
use rusqlite::{params, Row};

/// Repository interface for runtime-appended records.
pub trait RecordRepository: Send + Sync {
    /// Persists one record; returns its row id.
    fn append_record(&self, record: &PropertyRecord) -> RepoResult<i64>;
    /// Lists every persisted record in insertion order.
    fn list_records(&self) -> RepoResult<Vec<PropertyRecord>>;
}

/// SQLite-backed record repository over `property_records`.
pub struct SqliteRecordRepository {
    conn: SharedConnection,
}

impl SqliteRecordRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn append_record(&self, record: &PropertyRecord) -> RepoResult<i64> {
        record.validate()?;

        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO property_records (
                area_sqft,
                bedrooms,
                bathrooms,
                age_years,
                location,
                price_thousands
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                record.area_sqft,
                record.bedrooms,
                record.bathrooms,
                record.age_years,
                record.location.as_str(),
                record.price_thousands,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_records(&self) -> RepoResult<Vec<PropertyRecord>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT area_sqft, bedrooms, bathrooms, age_years, location, price_thousands
             FROM property_records
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }

        Ok(records)
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<PropertyRecord> {
    let location_text: String = row.get("location")?;
    let location = Location::parse(&location_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid location `{location_text}` in property_records.location"
        ))
    })?;

    let record = PropertyRecord {
        area_sqft: row.get("area_sqft")?,
        bedrooms: row.get("bedrooms")?,
        bathrooms: row.get("bathrooms")?,
        age_years: row.get("age_years")?,
        location,
        price_thousands: row.get("price_thousands")?,
    };
    record.validate()?;
    Ok(record)
}
