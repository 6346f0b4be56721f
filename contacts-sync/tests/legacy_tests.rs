mod common;

use common::{contact, owner};
use contacts_storage::{CheckpointStore, MemoryCheckpointStore};
use contacts_sync::memory::{MemoryIndex, MemoryLegacyContacts};
use contacts_sync::{LegacyStore, ProviderStore, SyncConfig, SyncCursor, Walker};
use contacts_types::{RevisionId, TaskOperation};
use std::sync::Arc;

async fn drain_ops(store: &LegacyStore, since: Option<&RevisionId>) -> Vec<TaskOperation> {
    let mut cursor = store.sync(since).await.unwrap();
    let mut ops = Vec::new();
    while let Some(task) = cursor.next().await.unwrap() {
        ops.push(task.operation);
    }
    ops
}

#[tokio::test]
async fn changed_revision_yields_full_snapshot() {
    let api = Arc::new(MemoryLegacyContacts::new());
    api.save(contact("1", "a")).unwrap();
    api.save(contact("2", "b")).unwrap();
    let store = LegacyStore::new(owner("mozContacts"), api);

    let ops = drain_ops(&store, None).await;
    assert_eq!(
        ops,
        vec![
            TaskOperation::Clear,
            TaskOperation::Add,
            TaskOperation::Add,
            TaskOperation::Done
        ]
    );
}

#[tokio::test]
async fn unchanged_revision_yields_only_done() {
    let api = Arc::new(MemoryLegacyContacts::new());
    api.save(contact("1", "a")).unwrap();
    let store = LegacyStore::new(owner("mozContacts"), api);
    let current = store.revision_id().await.unwrap();

    let ops = drain_ops(&store, Some(&current)).await;
    assert_eq!(ops, vec![TaskOperation::Done]);
}

#[tokio::test]
async fn legacy_store_syncs_through_walker() {
    let api = Arc::new(MemoryLegacyContacts::new());
    api.save(contact("1", "a")).unwrap();
    api.save(contact("2", "b")).unwrap();
    let store = Arc::new(LegacyStore::new(owner("mozContacts"), api.clone()));

    let index = Arc::new(MemoryIndex::new());
    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let walker = Walker::new(index.clone(), checkpoints.clone(), SyncConfig::default());

    walker.run(store.clone()).await.unwrap();
    assert_eq!(index.entries_for(&owner("mozContacts")).len(), 2);

    api.delete("2").unwrap();
    let report = walker.run(store.clone()).await.unwrap();

    let entries = index.entries_for(&owner("mozContacts"));
    assert_eq!(entries.len(), 1);
    assert!(entries.contains_key("1"));
    assert_eq!(
        checkpoints.get(&owner("mozContacts")).unwrap(),
        Some(report.committed_revision)
    );

    // Nothing changed since: a session only delivers `done`.
    let report = walker.run(store).await.unwrap();
    assert_eq!(report.applied, 1);
}

#[tokio::test]
async fn contact_saved_mid_session_is_synced_next_time() {
    let api = Arc::new(MemoryLegacyContacts::new());
    api.save(contact("1", "a")).unwrap();
    let store = Arc::new(LegacyStore::new(owner("mozContacts"), api.clone()));

    let index = Arc::new(MemoryIndex::new());
    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let walker = Walker::new(index.clone(), checkpoints.clone(), SyncConfig::default());

    let opened_at = store.revision_id().await.unwrap();
    let mut session = walker.open(store.clone()).await.unwrap();
    api.save(contact("2", "b")).unwrap();
    let report = session.drain().await.unwrap();

    assert_eq!(report.committed_revision, opened_at);
    assert_eq!(index.entries_for(&owner("mozContacts")).len(), 1);

    let report = walker.run(store.clone()).await.unwrap();
    assert_eq!(report.committed_revision, store.revision_id().await.unwrap());

    let entries = index.entries_for(&owner("mozContacts"));
    assert_eq!(entries.len(), 2);
    assert!(entries.contains_key("2"));
}
