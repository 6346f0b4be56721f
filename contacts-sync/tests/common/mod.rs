#![allow(dead_code)]

use async_trait::async_trait;
use contacts_storage::{CheckpointStore, MemoryCheckpointStore, StorageError, StorageResult};
use contacts_sync::memory::MemoryIndex;
use contacts_sync::{
    AggregatedIndex, MatchingCandidate, Merger, ProviderStore, SyncCursor, SyncError, SyncResult,
    TaskQueueCursor,
};
use contacts_types::{ContactRecord, RevisionId, StoreOwner, SyncTask};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn owner(s: &str) -> StoreOwner {
    StoreOwner::new(s)
}

pub fn contact(id: &str, name: &str) -> ContactRecord {
    ContactRecord::from_value(json!({"id": id, "name": [name]})).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Index that rejects chosen tasks ──────────────────────────────

/// Delegates to a [`MemoryIndex`] but rejects mutations of chosen ids, and
/// optionally `done`.
#[derive(Default)]
pub struct RejectingIndex {
    pub inner: MemoryIndex,
    reject_ids: HashSet<String>,
    reject_done: bool,
}

impl RejectingIndex {
    pub fn rejecting(ids: &[&str]) -> Self {
        Self {
            inner: MemoryIndex::new(),
            reject_ids: ids.iter().map(|s| s.to_string()).collect(),
            reject_done: false,
        }
    }

    pub fn rejecting_done() -> Self {
        Self {
            reject_done: true,
            ..Default::default()
        }
    }

    fn check(&self, id: Option<&str>) -> SyncResult<()> {
        match id {
            Some(id) if self.reject_ids.contains(id) => {
                Err(SyncError::Index(format!("rejected {id}")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AggregatedIndex for RejectingIndex {
    async fn init(&self) -> SyncResult<()> {
        self.inner.init().await
    }

    async fn add(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        self.check(id)?;
        self.inner.add(s, id, d).await
    }

    async fn update(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        self.check(id)?;
        self.inner.update(s, id, d).await
    }

    async fn remove(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        self.check(id)?;
        self.inner.remove(s, id, d).await
    }

    async fn clear(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        self.inner.clear(s, id, d).await
    }

    async fn done(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        if self.reject_done {
            return Err(SyncError::Index("done rejected".into()));
        }
        self.inner.done(s, id, d).await
    }
}

// ── Index that watches the checkpoint ────────────────────────────

/// Records, for every call, the checkpoint visible at that moment.
pub struct CheckpointWatchingIndex {
    pub inner: MemoryIndex,
    checkpoints: Arc<MemoryCheckpointStore>,
    pub seen: Mutex<Vec<(String, Option<RevisionId>)>>,
}

impl CheckpointWatchingIndex {
    pub fn new(checkpoints: Arc<MemoryCheckpointStore>) -> Self {
        Self {
            inner: MemoryIndex::new(),
            checkpoints,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn watch(&self, s: &dyn ProviderStore, op: &str) {
        let checkpoint = self.checkpoints.get(s.owner()).unwrap();
        self.seen.lock().unwrap().push((op.to_string(), checkpoint));
    }
}

#[async_trait]
impl AggregatedIndex for CheckpointWatchingIndex {
    async fn init(&self) -> SyncResult<()> {
        self.inner.init().await
    }

    async fn add(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        self.watch(s, "add");
        self.inner.add(s, id, d).await
    }

    async fn update(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        self.watch(s, "update");
        self.inner.update(s, id, d).await
    }

    async fn remove(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        self.watch(s, "remove");
        self.inner.remove(s, id, d).await
    }

    async fn clear(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        self.watch(s, "clear");
        self.inner.clear(s, id, d).await
    }

    async fn done(&self, s: &dyn ProviderStore, id: Option<&str>, d: Option<&Value>) -> SyncResult<()> {
        self.watch(s, "done");
        self.inner.done(s, id, d).await
    }
}

// ── Checkpoints that fail ────────────────────────────────────────

/// Fails the first `failures` writes, then behaves like memory storage.
#[derive(Default)]
pub struct FlakyCheckpoints {
    pub inner: MemoryCheckpointStore,
    failures_left: AtomicU32,
    pub set_calls: AtomicU32,
}

impl FlakyCheckpoints {
    pub fn failing(failures: u32) -> Self {
        Self {
            inner: MemoryCheckpointStore::new(),
            failures_left: AtomicU32::new(failures),
            set_calls: AtomicU32::new(0),
        }
    }
}

impl CheckpointStore for FlakyCheckpoints {
    fn get(&self, owner: &StoreOwner) -> StorageResult<Option<RevisionId>> {
        self.inner.get(owner)
    }

    fn set(&self, owner: &StoreOwner, revision: &RevisionId) -> StorageResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(StorageError::WriteFailed("disk full".into()));
        }
        self.inner.set(owner, revision)
    }

    fn clear(&self, owner: &StoreOwner) -> StorageResult<()> {
        self.inner.clear(owner)
    }
}

// ── Merger that records its input ────────────────────────────────

#[derive(Default)]
pub struct RecordingMerger {
    pub calls: Mutex<Vec<(ContactRecord, Vec<MatchingCandidate>)>>,
    reject: bool,
}

impl RecordingMerger {
    pub fn rejecting() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Merger for RecordingMerger {
    async fn in_memory_merge(
        &self,
        primary: ContactRecord,
        candidates: Vec<MatchingCandidate>,
    ) -> SyncResult<ContactRecord> {
        self.calls
            .lock()
            .unwrap()
            .push((primary.clone(), candidates.clone()));
        if self.reject {
            return Err(SyncError::Merge("conflicting records".into()));
        }
        let mut merged = primary;
        merged.insert("mergedFrom", json!(candidates.len() + 1));
        Ok(merged)
    }
}

// ── Stores with scripted behavior ────────────────────────────────

/// A store whose `get` always fails.
pub struct FailingStore {
    owner: StoreOwner,
}

impl FailingStore {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: StoreOwner::new(owner),
        }
    }
}

#[async_trait]
impl ProviderStore for FailingStore {
    fn owner(&self) -> &StoreOwner {
        &self.owner
    }

    async fn revision_id(&self) -> SyncResult<RevisionId> {
        Ok(RevisionId::new("r0"))
    }

    async fn get(&self, id: &str) -> SyncResult<Option<ContactRecord>> {
        Err(SyncError::Provider(format!("cannot read {id}")))
    }

    async fn sync(&self, _since: Option<&RevisionId>) -> SyncResult<Box<dyn SyncCursor>> {
        Err(SyncError::Provider("cannot sync".into()))
    }
}

/// A store that serves a fixed task list and tracks how many of its cursors
/// are open at once.
pub struct ScriptedStore {
    owner: StoreOwner,
    revision: RevisionId,
    tasks: Vec<SyncTask>,
    delay: Duration,
    pub opened: AtomicUsize,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ScriptedStore {
    pub fn new(owner: &str, revision: &str, tasks: Vec<SyncTask>) -> Self {
        Self {
            owner: StoreOwner::new(owner),
            revision: RevisionId::new(revision),
            tasks,
            delay: Duration::ZERO,
            opened: AtomicUsize::new(0),
            active: Arc::default(),
            max_active: Arc::default(),
        }
    }

    /// Sleeps before every task; shares concurrency counters with other
    /// stores built from the same pair.
    pub fn slow(mut self, delay: Duration, counters: (Arc<AtomicUsize>, Arc<AtomicUsize>)) -> Self {
        self.delay = delay;
        self.active = counters.0;
        self.max_active = counters.1;
        self
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderStore for ScriptedStore {
    fn owner(&self) -> &StoreOwner {
        &self.owner
    }

    async fn revision_id(&self) -> SyncResult<RevisionId> {
        Ok(self.revision.clone())
    }

    async fn get(&self, _id: &str) -> SyncResult<Option<ContactRecord>> {
        Ok(None)
    }

    async fn sync(&self, _since: Option<&RevisionId>) -> SyncResult<Box<dyn SyncCursor>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(SlowCursor {
            inner: TaskQueueCursor::new(self.revision.clone(), self.tasks.clone()),
            delay: self.delay,
            active: self.active.clone(),
        }))
    }
}

struct SlowCursor {
    inner: TaskQueueCursor,
    delay: Duration,
    active: Arc<AtomicUsize>,
}

#[async_trait]
impl SyncCursor for SlowCursor {
    async fn next(&mut self) -> SyncResult<Option<SyncTask>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let task = self.inner.next().await?;
        if task.as_ref().map_or(true, SyncTask::is_done) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(task)
    }

    fn revision(&self) -> &RevisionId {
        self.inner.revision()
    }
}
