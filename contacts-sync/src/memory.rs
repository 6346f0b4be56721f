//! In-memory implementations of the platform collaborators.
//!
//! These back the tests and the agent's fixture mode. They follow the
//! boundary contracts (revisioned change log, idempotent index mutations)
//! without any of the real engines' persistence or matching logic.

use crate::error::{SyncError, SyncResult};
use crate::index::AggregatedIndex;
use crate::provider::{
    snapshot_tasks, LegacyContactsApi, ProviderStore, StoreDiscovery, SyncCursor, TaskQueueCursor,
};
use crate::resolver::{MatchingCandidate, Merger};
use async_trait::async_trait;
use contacts_types::{ContactRecord, RevisionId, StoreOwner, SyncTask, TaskOperation};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

fn poisoned(what: &str) -> SyncError {
    SyncError::Provider(format!("{what} lock poisoned"))
}

fn revision_token(seq: u64) -> RevisionId {
    RevisionId::new(format!("rev-{seq}"))
}

fn parse_revision(revision: &RevisionId) -> Option<u64> {
    revision.as_str().strip_prefix("rev-")?.parse().ok()
}

// ── Provider store ───────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<String, ContactRecord>,
    /// Change log; the task at index `n` produced revision `n + 1`.
    log: Vec<SyncTask>,
}

/// A provider store holding its records and change log in memory.
///
/// Revisions are `rev-N`, where N is the number of logged changes. A cursor
/// opened from a known revision replays the log after it; from no revision
/// (or one this store never issued) it replays a full snapshot.
#[derive(Debug)]
pub struct MemoryProviderStore {
    owner: StoreOwner,
    state: Mutex<StoreState>,
}

impl MemoryProviderStore {
    pub fn new(owner: impl Into<StoreOwner>) -> Self {
        Self {
            owner: owner.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    fn state(&self) -> SyncResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| poisoned("provider store"))
    }

    /// Adds or replaces a record, logging `add` or `update`. Returns its id.
    pub fn put(&self, mut record: ContactRecord) -> SyncResult<String> {
        let id = record.ensure_id();
        let mut state = self.state()?;
        let task = if state.records.contains_key(&id) {
            SyncTask::update(id.clone(), record.to_value())
        } else {
            SyncTask::add(id.clone(), record.to_value())
        };
        state.records.insert(id.clone(), record);
        state.log.push(task);
        Ok(id)
    }

    /// Removes a record, logging `remove`. Returns whether it existed.
    pub fn remove(&self, id: &str) -> SyncResult<bool> {
        let mut state = self.state()?;
        let existed = state.records.remove(id).is_some();
        if existed {
            state.log.push(SyncTask::remove(id));
        }
        Ok(existed)
    }

    /// Drops every record, logging `clear`.
    pub fn clear(&self) -> SyncResult<()> {
        let mut state = self.state()?;
        state.records.clear();
        state.log.push(SyncTask::clear());
        Ok(())
    }

    /// Appends a raw task to the change log without touching the records.
    /// Lets a store emit operations newer than this core understands.
    pub fn log_task(&self, task: SyncTask) -> SyncResult<()> {
        self.state()?.log.push(task);
        Ok(())
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.state().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProviderStore for MemoryProviderStore {
    fn owner(&self) -> &StoreOwner {
        &self.owner
    }

    async fn revision_id(&self) -> SyncResult<RevisionId> {
        Ok(revision_token(self.state()?.log.len() as u64))
    }

    async fn get(&self, id: &str) -> SyncResult<Option<ContactRecord>> {
        Ok(self.state()?.records.get(id).cloned())
    }

    async fn sync(&self, since: Option<&RevisionId>) -> SyncResult<Box<dyn SyncCursor>> {
        let state = self.state()?;
        let from = since
            .and_then(parse_revision)
            .filter(|seq| *seq as usize <= state.log.len());

        let tasks = match from {
            Some(seq) => {
                let mut tasks: Vec<SyncTask> = state.log[seq as usize..].to_vec();
                tasks.push(SyncTask::done());
                tasks
            }
            None => snapshot_tasks(state.records.values().cloned()),
        };
        let revision = revision_token(state.log.len() as u64);
        Ok(Box::new(TaskQueueCursor::new(revision, tasks)))
    }
}

// ── Discovery ────────────────────────────────────────────────────

/// Discovery over a list of registered stores.
#[derive(Default)]
pub struct StaticDiscovery {
    stores: RwLock<Vec<(String, Arc<dyn ProviderStore>)>>,
    calls: AtomicUsize,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a store of the given kind. Visible from the next discovery.
    pub fn register(&self, kind: impl Into<String>, store: Arc<dyn ProviderStore>) -> SyncResult<()> {
        self.stores
            .write()
            .map_err(|_| poisoned("discovery"))?
            .push((kind.into(), store));
        Ok(())
    }

    /// How many times `discover` ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreDiscovery for StaticDiscovery {
    async fn discover(&self, kind: &str) -> SyncResult<Vec<Arc<dyn ProviderStore>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stores = self.stores.read().map_err(|_| poisoned("discovery"))?;
        Ok(stores
            .iter()
            .filter(|(k, _)| k == kind)
            .map(|(_, store)| store.clone())
            .collect())
    }
}

// ── Legacy contacts API ──────────────────────────────────────────

/// The legacy contacts database, with a revision counter bumped on every
/// write.
#[derive(Debug, Default)]
pub struct MemoryLegacyContacts {
    records: RwLock<BTreeMap<String, ContactRecord>>,
    revision: AtomicU64,
}

impl MemoryLegacyContacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves a contact. Returns its id.
    pub fn save(&self, mut record: ContactRecord) -> SyncResult<String> {
        let id = record.ensure_id();
        self.records
            .write()
            .map_err(|_| poisoned("legacy contacts"))?
            .insert(id.clone(), record);
        self.revision.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    /// Deletes a contact. Returns whether it existed.
    pub fn delete(&self, id: &str) -> SyncResult<bool> {
        let existed = self
            .records
            .write()
            .map_err(|_| poisoned("legacy contacts"))?
            .remove(id)
            .is_some();
        if existed {
            self.revision.fetch_add(1, Ordering::SeqCst);
        }
        Ok(existed)
    }
}

#[async_trait]
impl LegacyContactsApi for MemoryLegacyContacts {
    async fn find(&self, id: &str) -> SyncResult<Option<ContactRecord>> {
        let records = self.records.read().map_err(|_| poisoned("legacy contacts"))?;
        Ok(records.get(id).cloned())
    }

    async fn revision(&self) -> SyncResult<RevisionId> {
        Ok(revision_token(self.revision.load(Ordering::SeqCst)))
    }

    async fn all(&self) -> SyncResult<Vec<ContactRecord>> {
        let records = self.records.read().map_err(|_| poisoned("legacy contacts"))?;
        Ok(records.values().cloned().collect())
    }
}

// ── Aggregated index ─────────────────────────────────────────────

/// One call received by [`MemoryIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCall {
    pub owner: StoreOwner,
    pub operation: TaskOperation,
    pub id: Option<String>,
}

#[derive(Debug, Default)]
struct IndexState {
    initialized: bool,
    entries: BTreeMap<(StoreOwner, String), Value>,
    calls: Vec<IndexCall>,
}

/// A flat aggregated index: one entry per (store, record id).
///
/// Upserts on add/update, deletes on remove, drops a store's entries on
/// clear. Every mutation is idempotent.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    state: Mutex<IndexState>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> SyncResult<MutexGuard<'_, IndexState>> {
        self.state
            .lock()
            .map_err(|_| SyncError::Index("index lock poisoned".into()))
    }

    pub fn is_initialized(&self) -> bool {
        self.state().map(|s| s.initialized).unwrap_or(false)
    }

    /// Snapshot of every entry, keyed by store and record id.
    pub fn snapshot(&self) -> BTreeMap<(StoreOwner, String), Value> {
        self.state().map(|s| s.entries.clone()).unwrap_or_default()
    }

    /// Entries contributed by one store, keyed by record id.
    pub fn entries_for(&self, owner: &StoreOwner) -> HashMap<String, Value> {
        self.state()
            .map(|s| {
                s.entries
                    .iter()
                    .filter(|((o, _), _)| o == owner)
                    .map(|((_, id), v)| (id.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every call received, in order.
    pub fn calls(&self) -> Vec<IndexCall> {
        self.state().map(|s| s.calls.clone()).unwrap_or_default()
    }

    fn record(
        &self,
        store: &dyn ProviderStore,
        operation: TaskOperation,
        id: Option<&str>,
    ) -> SyncResult<MutexGuard<'_, IndexState>> {
        let mut state = self.state()?;
        state.calls.push(IndexCall {
            owner: store.owner().clone(),
            operation,
            id: id.map(str::to_string),
        });
        Ok(state)
    }

    fn upsert(
        &self,
        store: &dyn ProviderStore,
        operation: TaskOperation,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()> {
        let id = id.ok_or_else(|| SyncError::Index(format!("{operation} without id")))?;
        let data = data.ok_or_else(|| SyncError::Index(format!("{operation} {id} without data")))?;
        let mut state = self.record(store, operation, Some(id))?;
        state
            .entries
            .insert((store.owner().clone(), id.to_string()), data.clone());
        Ok(())
    }
}

#[async_trait]
impl AggregatedIndex for MemoryIndex {
    async fn init(&self) -> SyncResult<()> {
        self.state()?.initialized = true;
        Ok(())
    }

    async fn add(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()> {
        self.upsert(store, TaskOperation::Add, id, data)
    }

    async fn update(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        data: Option<&Value>,
    ) -> SyncResult<()> {
        self.upsert(store, TaskOperation::Update, id, data)
    }

    async fn remove(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        _data: Option<&Value>,
    ) -> SyncResult<()> {
        let id = id.ok_or_else(|| SyncError::Index("remove without id".into()))?;
        let mut state = self.record(store, TaskOperation::Remove, Some(id))?;
        state.entries.remove(&(store.owner().clone(), id.to_string()));
        Ok(())
    }

    async fn clear(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        _data: Option<&Value>,
    ) -> SyncResult<()> {
        let mut state = self.record(store, TaskOperation::Clear, id)?;
        let owner = store.owner();
        state.entries.retain(|(o, _), _| o != owner);
        Ok(())
    }

    async fn done(
        &self,
        store: &dyn ProviderStore,
        id: Option<&str>,
        _data: Option<&Value>,
    ) -> SyncResult<()> {
        self.record(store, TaskOperation::Done, id)?;
        Ok(())
    }
}

// ── Merger ───────────────────────────────────────────────────────

/// Minimal merger: starts from the primary record and copies over every
/// top-level field it lacks, candidate by candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FillMissingMerger;

#[async_trait]
impl Merger for FillMissingMerger {
    async fn in_memory_merge(
        &self,
        primary: ContactRecord,
        candidates: Vec<MatchingCandidate>,
    ) -> SyncResult<ContactRecord> {
        let mut merged = primary;
        for candidate in candidates {
            for (field, value) in candidate.matching_contact.fields() {
                if !merged.contains(field) {
                    merged.insert(field.clone(), value.clone());
                }
            }
        }
        Ok(merged)
    }
}
