//! Boundary to the aggregated contact index.
//!
//! The index engine itself lives outside this crate. The walker only needs
//! to forward provider tasks to it, one method per task kind.

use crate::error::SyncResult;
use crate::provider::ProviderStore;
use async_trait::async_trait;
use contacts_types::{SyncTask, TaskOperation};
use serde_json::Value;

/// Mutator of the aggregated index.
///
/// Every method must be idempotent: after a crash the walker replays all
/// tasks since the last checkpoint, so the same task can arrive twice.
#[async_trait]
pub trait AggregatedIndex: Send + Sync {
    /// Prepares the index. Called once when the host starts.
    async fn init(&self) -> SyncResult<()>;

    async fn add(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()>;

    async fn update(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()>;

    async fn remove(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()>;

    async fn clear(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()>;

    /// Called once the cursor delivered `done`, before the checkpoint moves.
    async fn done(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()>;
}

/// Forwards one task to the matching index method.
///
/// Returns `Ok(false)` for an unknown operation, which is never forwarded.
pub async fn apply_task(
    index: &dyn AggregatedIndex,
    store: &dyn ProviderStore,
    task: &SyncTask,
) -> SyncResult<bool> {
    let id = task.id.as_deref();
    let data = task.data.as_ref();
    match &task.operation {
        TaskOperation::Add => index.add(store, id, data).await?,
        TaskOperation::Update => index.update(store, id, data).await?,
        TaskOperation::Remove => index.remove(store, id, data).await?,
        TaskOperation::Clear => index.clear(store, id, data).await?,
        TaskOperation::Done => index.done(store, id, data).await?,
        TaskOperation::Unknown(_) => return Ok(false),
    }
    Ok(true)
}
