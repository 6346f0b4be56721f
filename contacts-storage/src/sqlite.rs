//! SQLite-backed checkpoints.
//!
//! Uses its own small database file so checkpoint writes never contend with
//! the aggregated index.

use crate::{CheckpointStore, StorageError, StorageResult};
use contacts_types::{RevisionId, StoreOwner};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Persistent checkpoint store backed by SQLite.
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    /// Opens (or creates) a checkpoint database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!("Opened checkpoint store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Opens an in-memory checkpoint store (for testing).
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
            CREATE TABLE IF NOT EXISTS checkpoints (
                owner TEXT PRIMARY KEY,
                revision TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Returns every stored checkpoint, ordered by owner.
    pub fn all(&self) -> StorageResult<Vec<(StoreOwner, RevisionId)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT owner, revision FROM checkpoints ORDER BY owner")?;
        let rows = stmt.query_map([], |row| {
            let owner: String = row.get(0)?;
            let revision: String = row.get(1)?;
            Ok((StoreOwner::new(owner), RevisionId::new(revision)))
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Returns when the checkpoint for `owner` was last written (unix millis).
    pub fn updated_at(&self, owner: &StoreOwner) -> StorageResult<Option<i64>> {
        let conn = self.lock()?;
        let ts = conn
            .query_row(
                "SELECT updated_at FROM checkpoints WHERE owner = ?1",
                params![owner.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts)
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn get(&self, owner: &StoreOwner) -> StorageResult<Option<RevisionId>> {
        let conn = self.lock()?;
        let revision: Option<String> = conn
            .query_row(
                "SELECT revision FROM checkpoints WHERE owner = ?1",
                params![owner.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(revision.map(RevisionId::new))
    }

    fn set(&self, owner: &StoreOwner, revision: &RevisionId) -> StorageResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.lock()?.execute(
            "INSERT OR REPLACE INTO checkpoints (owner, revision, updated_at) VALUES (?1, ?2, ?3)",
            params![owner.as_str(), revision.as_str(), now],
        )?;
        debug!("Checkpoint for {} set to {}", owner, revision);
        Ok(())
    }

    fn clear(&self, owner: &StoreOwner) -> StorageResult<()> {
        self.lock()?.execute(
            "DELETE FROM checkpoints WHERE owner = ?1",
            params![owner.as_str()],
        )?;
        Ok(())
    }
}
