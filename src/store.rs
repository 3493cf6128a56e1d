//! Persistent key-value store for parental settings
//!
//! Values are stored as strings; structured values (banned words, history)
//! are JSON-encoded by the settings layer.

use crate::db::DbPool;
use crate::{Error, Result};

/// Key holding the parent PIN
pub const PIN_KEY: &str = "pin";

/// Key holding the JSON array of banned words
pub const BANNED_WORDS_KEY: &str = "bannedWords";

/// Key holding the JSON array of history entries
pub const HISTORY_KEY: &str = "history";

/// String key-value persistence
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if never written
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace the value stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// `SQLite`-backed key-value store
#[derive(Clone)]
pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    /// Create a new store backed by the given pool
    #[must_use]
    pub const fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.db.get().map_err(|e| Error::Database(e.to_string()))?;
        let result = conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Database(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.db.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            rusqlite::params![key, value],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::trace!(key, "stored value");
        Ok(())
    }
}
