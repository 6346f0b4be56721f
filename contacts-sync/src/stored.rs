//! Aggregated index kept in a SQLite entry table.
//!
//! Lets a host persist index entries next to its checkpoints, so a restart
//! resumes from checkpoints that still describe what the index holds.

use crate::error::{SyncError, SyncResult};
use crate::index::AggregatedIndex;
use crate::provider::ProviderStore;
use async_trait::async_trait;
use contacts_storage::{SqliteEntryStore, StorageResult};
use contacts_types::StoreOwner;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Index mutator writing one row per provider record.
#[derive(Clone)]
pub struct StoredIndex {
    entries: Arc<SqliteEntryStore>,
}

impl StoredIndex {
    pub fn new(entries: Arc<SqliteEntryStore>) -> Self {
        Self { entries }
    }

    /// Entries currently stored for `owner`, ordered by id.
    pub async fn entries_for(&self, owner: &StoreOwner) -> SyncResult<Vec<(String, Value)>> {
        let owner = owner.clone();
        self.blocking(move |entries| entries.entries_for(&owner)).await
    }

    async fn blocking<T, F>(&self, op: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteEntryStore) -> StorageResult<T> + Send + 'static,
    {
        let entries = self.entries.clone();
        let value = tokio::task::spawn_blocking(move || op(&entries))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))??;
        Ok(value)
    }

    async fn upsert(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()> {
        let id = id.ok_or_else(|| SyncError::Index("upsert without id".into()))?;
        let data = data
            .ok_or_else(|| SyncError::Index(format!("{id} without data")))?
            .clone();
        let (owner, id) = (store.owner().clone(), id.to_string());
        self.blocking(move |entries| entries.upsert(&owner, &id, &data))
            .await
    }
}

#[async_trait]
impl AggregatedIndex for StoredIndex {
    async fn init(&self) -> SyncResult<()> {
        let count = self.blocking(|entries| entries.len()).await?;
        debug!("Stored index holds {} entries", count);
        Ok(())
    }

    async fn add(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()> {
        self.upsert(store, id, data).await
    }

    async fn update(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()> {
        self.upsert(store, id, data).await
    }

    async fn remove(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        _data: Option<&Value>,
    ) -> SyncResult<()> {
        let id = id
            .ok_or_else(|| SyncError::Index("remove without id".into()))?
            .to_string();
        let owner = store.owner().clone();
        self.blocking(move |entries| entries.remove(&owner, &id))
            .await?;
        Ok(())
    }

    async fn clear(
        &self,
        store: &dyn ProviderStore,
        _id: Option<&str>,
        _data: Option<&Value>,
    ) -> SyncResult<()> {
        let owner = store.owner().clone();
        self.blocking(move |entries| entries.clear_owner(&owner))
            .await?;
        Ok(())
    }

    async fn done(
        &self,
        store: &dyn ProviderStore,
        _id: Option<&str>,
        _data: Option<&Value>,
    ) -> SyncResult<()> {
        debug!("Stored index caught up with {}", store.owner());
        Ok(())
    }
}
