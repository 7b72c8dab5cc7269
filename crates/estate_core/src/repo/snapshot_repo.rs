//! Versioned key/value storage for serialized model snapshots.
//!
//! # Responsibility
//! - Persist opaque snapshot payloads under string slot keys.
//! - Return the latest version of a slot on load.
//!
//! # Invariants
//! - Versions of one slot start at 1 and increase by 1 per save.
//! - A save is a single insert; readers never observe partial payloads.
//! - Older versions are retained; `load_latest` always wins on the newest.

use crate::repo::{lock, RepoError, RepoResult, SharedConnection};
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::sync::Mutex;

/// Well-known slot for the active price model.
pub const PRICE_MODEL_SLOT: &str = "price_model/latest";

/// One stored snapshot version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub slot_key: String,
    pub version: i64,
    pub payload: String,
}

/// Storage contract for snapshot slots.
pub trait SnapshotStore: Send + Sync {
    /// Returns the newest version stored under `slot_key`.
    fn load_latest(&self, slot_key: &str) -> RepoResult<Option<StoredSnapshot>>;
    /// Stores `payload` as the next version and returns that version.
    fn save(&self, slot_key: &str, payload: &str) -> RepoResult<i64>;
    /// Removes every version of `slot_key`; returns removed row count.
    fn clear(&self, slot_key: &str) -> RepoResult<usize>;
}

/// SQLite-backed snapshot store over the `model_snapshots` table.
pub struct SqliteSnapshotStore {
    conn: SharedConnection,
}

impl SqliteSnapshotStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn load_latest(&self, slot_key: &str) -> RepoResult<Option<StoredSnapshot>> {
        let conn = lock(&self.conn)?;
        let row = conn
            .query_row(
                "SELECT slot_key, version, payload
                 FROM model_snapshots
                 WHERE slot_key = ?1
                 ORDER BY version DESC
                 LIMIT 1;",
                [slot_key],
                |row| {
                    Ok(StoredSnapshot {
                        slot_key: row.get(0)?,
                        version: row.get(1)?,
                        payload: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn save(&self, slot_key: &str, payload: &str) -> RepoResult<i64> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let version: i64 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM model_snapshots WHERE slot_key = ?1;",
            [slot_key],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO model_snapshots (slot_key, version, payload) VALUES (?1, ?2, ?3);",
            params![slot_key, version, payload],
        )?;
        tx.commit()?;
        Ok(version)
    }

    fn clear(&self, slot_key: &str) -> RepoResult<usize> {
        let conn = lock(&self.conn)?;
        let removed = conn.execute("DELETE FROM model_snapshots WHERE slot_key = ?1;", [slot_key])?;
        Ok(removed)
    }
}

/// Process-local snapshot store for hosts without a database.
#[derive(Default)]
pub struct MemorySnapshotStore {
    slots: Mutex<HashMap<String, Vec<String>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load_latest(&self, slot_key: &str) -> RepoResult<Option<StoredSnapshot>> {
        let slots = self.slots.lock().map_err(|_| RepoError::LockPoisoned)?;
        Ok(slots.get(slot_key).and_then(|versions| {
            versions.last().map(|payload| StoredSnapshot {
                slot_key: slot_key.to_string(),
                version: versions.len() as i64,
                payload: payload.clone(),
            })
        }))
    }

    fn save(&self, slot_key: &str, payload: &str) -> RepoResult<i64> {
        let mut slots = self.slots.lock().map_err(|_| RepoError::LockPoisoned)?;
        let versions = slots.entry(slot_key.to_string()).or_default();
        versions.push(payload.to_string());
        Ok(versions.len() as i64)
    }

    fn clear(&self, slot_key: &str) -> RepoResult<usize> {
        let mut slots = self.slots.lock().map_err(|_| RepoError::LockPoisoned)?;
        Ok(slots.remove(slot_key).map_or(0, |versions| versions.len()))
    }
}
