//! Provider store abstraction.
//!
//! Defines the traits the platform implements for each contact provider's
//! data store, plus the wrapper that makes the legacy contacts API look like
//! one more provider store.

use crate::error::SyncResult;
use async_trait::async_trait;
use contacts_types::{ContactRecord, RevisionId, StoreOwner, SyncTask};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// A lazy, finite, non-restartable feed of pending changes.
///
/// Yields tasks in provider order and ends with a `done` task. `Ok(None)`
/// means the cursor is exhausted.
#[async_trait]
pub trait SyncCursor: Send {
    async fn next(&mut self) -> SyncResult<Option<SyncTask>>;

    /// Revision the cursor drains up to, fixed when it was opened.
    ///
    /// Writes landing after that point belong to a later cursor, so this
    /// value, not the store's live revision, becomes the checkpoint.
    fn revision(&self) -> &RevisionId;
}

/// A data store owned by one contact provider.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// Identity of the owning provider. Unique across stores.
    fn owner(&self) -> &StoreOwner;

    /// Current revision of the store.
    async fn revision_id(&self) -> SyncResult<RevisionId>;

    /// Fetches a single record. Returns `None` if the store has no such id.
    async fn get(&self, id: &str) -> SyncResult<Option<ContactRecord>>;

    /// Opens a cursor over every change after `since`. With `None`, the
    /// cursor replays the whole store.
    async fn sync(&self, since: Option<&RevisionId>) -> SyncResult<Box<dyn SyncCursor>>;
}

/// Platform discovery of provider stores.
#[async_trait]
pub trait StoreDiscovery: Send + Sync {
    /// Returns every store of the given kind currently installed.
    async fn discover(&self, kind: &str) -> SyncResult<Vec<Arc<dyn ProviderStore>>>;
}

/// The legacy contacts API: a contact database without a change log.
#[async_trait]
pub trait LegacyContactsApi: Send + Sync {
    /// Looks up a contact by id.
    async fn find(&self, id: &str) -> SyncResult<Option<ContactRecord>>;

    /// Current revision of the database.
    async fn revision(&self) -> SyncResult<RevisionId>;

    /// Every contact in the database.
    async fn all(&self) -> SyncResult<Vec<ContactRecord>>;
}

/// A cursor over a precomputed list of tasks, taken at `revision`.
#[derive(Debug)]
pub struct TaskQueueCursor {
    revision: RevisionId,
    tasks: VecDeque<SyncTask>,
}

impl TaskQueueCursor {
    pub fn new(revision: RevisionId, tasks: impl IntoIterator<Item = SyncTask>) -> Self {
        Self {
            revision,
            tasks: tasks.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SyncCursor for TaskQueueCursor {
    async fn next(&mut self) -> SyncResult<Option<SyncTask>> {
        Ok(self.tasks.pop_front())
    }

    fn revision(&self) -> &RevisionId {
        &self.revision
    }
}

/// Builds a full-snapshot task list: `clear`, one `add` per record, `done`.
pub fn snapshot_tasks(records: impl IntoIterator<Item = ContactRecord>) -> Vec<SyncTask> {
    let mut tasks = vec![SyncTask::clear()];
    for mut record in records {
        let id = record.ensure_id();
        tasks.push(SyncTask::add(id, record.into_value()));
    }
    tasks.push(SyncTask::done());
    tasks
}

/// Presents the legacy contacts API as an ordinary provider store.
///
/// Without a change log, any revision change produces a full snapshot.
/// Replaying a snapshot over the index is idempotent because it starts with
/// `clear`. The revision is read before the contacts, so a write racing the
/// snapshot is at worst delivered twice, never skipped.
pub struct LegacyStore {
    owner: StoreOwner,
    api: Arc<dyn LegacyContactsApi>,
}

impl LegacyStore {
    pub fn new(owner: StoreOwner, api: Arc<dyn LegacyContactsApi>) -> Self {
        Self { owner, api }
    }
}

#[async_trait]
impl ProviderStore for LegacyStore {
    fn owner(&self) -> &StoreOwner {
        &self.owner
    }

    async fn revision_id(&self) -> SyncResult<RevisionId> {
        self.api.revision().await
    }

    async fn get(&self, id: &str) -> SyncResult<Option<ContactRecord>> {
        self.api.find(id).await
    }

    async fn sync(&self, since: Option<&RevisionId>) -> SyncResult<Box<dyn SyncCursor>> {
        let current = self.api.revision().await?;
        if since == Some(&current) {
            debug!("Legacy store {} unchanged at {}", self.owner, current);
            return Ok(Box::new(TaskQueueCursor::new(current, [SyncTask::done()])));
        }

        let records = self.api.all().await?;
        debug!(
            "Legacy store {} changed ({:?} -> {}), replaying {} records",
            self.owner,
            since,
            current,
            records.len()
        );
        Ok(Box::new(TaskQueueCursor::new(current, snapshot_tasks(records))))
    }
}
