//! Storage layer for posture statistics.
//!
//! Persistence is reached only through the [`KeyValueStore`] contract:
//! `get(keys)`, `set(entries)` and `remove(keys)` over JSON values. Two
//! implementations are provided:
//!
//! - [`SqliteStore`]: a single `kv` table in a `rusqlite` database.
//! - [`MemoryStore`]: a `HashMap`, for tests and ephemeral runs.
//!
//! # Thread Safety
//!
//! [`SqliteStore`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Share it behind a `Mutex` when writes happen off the accounting
//! thread.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE kv (
//!     key TEXT PRIMARY KEY,
//!     value TEXT NOT NULL,      -- JSON
//!     updated_at TEXT NOT NULL  -- ISO 8601, UTC
//! );
//! ```

mod memory;
pub mod statistics;

use std::collections::HashMap;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use statistics::{
    CURRENT_ACTIVITY_KEY, STATISTICS_KEY, clear_statistics, load_current_activity,
    load_statistics, save_current_activity, save_statistics,
};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A value could not be encoded or the stored text is not valid JSON.
    #[error("invalid JSON for key {key}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal key-value contract used for persistence.
pub trait KeyValueStore {
    /// Returns the values of the requested keys that exist.
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError>;

    /// Writes all entries, replacing existing values.
    fn set(&mut self, entries: HashMap<String, Value>) -> Result<(), StoreError>;

    /// Deletes the given keys. Missing keys are not an error.
    fn remove(&mut self, keys: &[&str]) -> Result<(), StoreError>;
}

/// `SQLite`-backed key-value store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens a store at the given path, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Opens an in-memory store. Contents are lost when it is dropped.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Initializes the schema. Idempotent.
    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = stmt
                .query_row(params![key], |row| row.get(0))
                .optional()?;
            if let Some(raw) = raw {
                let value = serde_json::from_str(&raw).map_err(|source| StoreError::Json {
                    key: (*key).to_string(),
                    source,
                })?;
                values.insert((*key).to_string(), value);
            }
        }
        Ok(values)
    }

    fn set(&mut self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                ",
            )?;
            for (key, value) in &entries {
                let raw = serde_json::to_string(value).map_err(|source| StoreError::Json {
                    key: key.clone(),
                    source,
                })?;
                stmt.execute(params![key, raw, now])?;
            }
        }
        tx.commit()?;
        tracing::trace!(keys = entries.len(), "stored entries");
        Ok(())
    }

    fn remove(&mut self, keys: &[&str]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM kv WHERE key = ?1")?;
            for key in keys {
                stmt.execute(params![key])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
