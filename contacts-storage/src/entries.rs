//! SQLite-backed index entries, one row per (store owner, record id).

use crate::{StorageError, StorageResult};
use contacts_types::StoreOwner;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Persistent record data per provider store.
#[derive(Clone)]
pub struct SqliteEntryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEntryStore {
    /// Opens (or creates) an entry database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!("Opened entry store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Opens an in-memory entry store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StorageResult<()> {
        self.lock()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entries (
                owner TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (owner, id)
            );
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Inserts or replaces the entry for `(owner, id)`.
    pub fn upsert(&self, owner: &StoreOwner, id: &str, data: &Value) -> StorageResult<()> {
        let json = serde_json::to_string(data)?;
        let now = chrono::Utc::now().timestamp_millis();
        self.lock()?.execute(
            "INSERT OR REPLACE INTO entries (owner, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![owner.as_str(), id, json, now],
        )?;
        Ok(())
    }

    /// Deletes one entry. Returns whether it existed.
    pub fn remove(&self, owner: &StoreOwner, id: &str) -> StorageResult<bool> {
        let deleted = self.lock()?.execute(
            "DELETE FROM entries WHERE owner = ?1 AND id = ?2",
            params![owner.as_str(), id],
        )?;
        Ok(deleted > 0)
    }

    /// Deletes every entry of `owner`. Returns how many were dropped.
    pub fn clear_owner(&self, owner: &StoreOwner) -> StorageResult<usize> {
        let deleted = self.lock()?.execute(
            "DELETE FROM entries WHERE owner = ?1",
            params![owner.as_str()],
        )?;
        debug!("Cleared {} entries of {}", deleted, owner);
        Ok(deleted)
    }

    /// Entries of `owner`, ordered by id.
    pub fn entries_for(&self, owner: &StoreOwner) -> StorageResult<Vec<(String, Value)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, data FROM entries WHERE owner = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![owner.as_str()], |row| {
            let id: String = row.get(0)?;
            let data: String = row.get(1)?;
            Ok((id, data))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, data) = row?;
            result.push((id, serde_json::from_str(&data)?));
        }
        Ok(result)
    }

    /// Total number of entries across all owners.
    pub fn len(&self) -> StorageResult<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}
