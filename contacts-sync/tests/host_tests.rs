mod common;

use common::{contact, owner, ScriptedStore};
use contacts_storage::{CheckpointStore, MemoryCheckpointStore};
use contacts_sync::memory::{FillMissingMerger, MemoryIndex, MemoryProviderStore, StaticDiscovery};
use contacts_sync::{
    HostEvent, StoreRegistry, SyncConfig, SyncError, SyncHost, TriggerMessage,
};
use contacts_types::{RevisionId, SyncTask};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct World {
    discovery: Arc<StaticDiscovery>,
    index: Arc<MemoryIndex>,
    checkpoints: Arc<MemoryCheckpointStore>,
    host: SyncHost,
}

async fn world() -> World {
    let discovery = Arc::new(StaticDiscovery::new());
    let store = Arc::new(MemoryProviderStore::new("app://sim"));
    store.put(contact("1", "Bob")).unwrap();
    discovery.register("contacts", store).unwrap();

    let config = SyncConfig::default();
    let registry = Arc::new(StoreRegistry::new(discovery.clone(), &config));
    let index = Arc::new(MemoryIndex::new());
    let checkpoints = Arc::new(MemoryCheckpointStore::new());
    let host = SyncHost::start(registry, checkpoints.clone(), index.clone(), config)
        .await
        .unwrap();

    World {
        discovery,
        index,
        checkpoints,
        host,
    }
}

// ── Trigger messages ─────────────────────────────────────────────

#[test]
fn trigger_decodes_from_json() {
    let trigger = TriggerMessage::from_json(r#"{"owner":"app://sim"}"#).unwrap();
    assert_eq!(trigger, TriggerMessage::new("app://sim"));
}

#[test]
fn malformed_trigger_is_protocol_error() {
    for raw in ["", "{}", r#"{"owner": 3}"#, "[]"] {
        let err = TriggerMessage::from_json(raw).unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)), "{raw}");
    }
}

// ── Direct dispatch ──────────────────────────────────────────────

#[tokio::test]
async fn start_initializes_index() {
    let w = world().await;
    assert!(w.index.is_initialized());
    assert_eq!(w.host.config().store_kind, "contacts");
}

#[tokio::test]
async fn trigger_runs_session_and_commits() {
    let w = world().await;
    let report = w
        .host
        .handle_trigger(&TriggerMessage::new("app://sim"))
        .await
        .unwrap();

    assert_eq!(report.committed_revision, RevisionId::new("rev-1"));
    assert_eq!(
        w.checkpoints.get(&owner("app://sim")).unwrap(),
        Some(RevisionId::new("rev-1"))
    );
    assert_eq!(w.index.entries_for(&owner("app://sim")).len(), 1);
    assert!(!w.host.is_session_running(&owner("app://sim")).await);
}

#[tokio::test]
async fn unknown_owner_applies_nothing() {
    let w = world().await;
    let err = w
        .host
        .handle_trigger(&TriggerMessage::new("app://nobody"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::StoreNotFound(_)));
    assert!(w.index.calls().is_empty());
    assert_eq!(w.discovery.calls(), 1);
}

#[tokio::test]
async fn resolver_shares_host_registry() {
    let w = world().await;
    let resolver = w.host.resolver(Arc::new(FillMissingMerger));
    let merged = resolver
        .get_data(&json!({"id": "agg-1", "entryData": [{"origin": "app://sim", "uid": "1"}]}))
        .await
        .unwrap();

    assert_eq!(merged.id(), Some("agg-1"));
    assert_eq!(w.host.registry().discovery_count(), 1);
}

// ── Session serialization ────────────────────────────────────────

fn slow_store(
    name: &str,
    counters: &(Arc<std::sync::atomic::AtomicUsize>, Arc<std::sync::atomic::AtomicUsize>),
) -> Arc<ScriptedStore> {
    Arc::new(
        ScriptedStore::new(
            name,
            "r1",
            vec![SyncTask::add("1", json!({"id": "1"})), SyncTask::done()],
        )
        .slow(Duration::from_millis(20), counters.clone()),
    )
}

async fn host_with(stores: Vec<Arc<ScriptedStore>>) -> SyncHost {
    let discovery = Arc::new(StaticDiscovery::new());
    for store in stores {
        discovery.register("contacts", store).unwrap();
    }
    let config = SyncConfig::default();
    let registry = Arc::new(StoreRegistry::new(discovery, &config));
    SyncHost::start(
        registry,
        Arc::new(MemoryCheckpointStore::new()),
        Arc::new(MemoryIndex::new()),
        config,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn sessions_for_same_owner_never_overlap() {
    let counters = Default::default();
    let store = slow_store("app://slow", &counters);
    let host = host_with(vec![store.clone()]).await;

    let trigger = TriggerMessage::new("app://slow");
    let (a, b) = tokio::join!(host.handle_trigger(&trigger), host.handle_trigger(&trigger));
    a.unwrap();
    b.unwrap();

    assert_eq!(store.opened.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(store.max_active(), 1);
}

#[tokio::test]
async fn session_reported_running_only_while_it_holds_the_lock() {
    let counters = Default::default();
    let store = slow_store("app://slow", &counters);
    let host = host_with(vec![store]).await;
    let slow = owner("app://slow");

    let slow_trigger = TriggerMessage::new("app://slow");
    let (report, running) = tokio::join!(
        host.handle_trigger(&slow_trigger),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            host.is_session_running(&slow).await
        }
    );
    report.unwrap();

    assert!(running);
    assert!(!host.is_session_running(&slow).await);
    assert!(!host.is_session_running(&owner("app://never")).await);
}

#[tokio::test]
async fn sessions_for_different_owners_interleave() {
    let counters = Default::default();
    let one = slow_store("app://one", &counters);
    let two = slow_store("app://two", &counters);
    let host = host_with(vec![one.clone(), two]).await;

    let trigger_one = TriggerMessage::new("app://one");
    let trigger_two = TriggerMessage::new("app://two");
    let (a, b) = tokio::join!(
        host.handle_trigger(&trigger_one),
        host.handle_trigger(&trigger_two)
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(one.max_active(), 2);
}

// ── Spawned command loop ─────────────────────────────────────────

#[tokio::test]
async fn spawned_host_reports_session_events() {
    let w = world().await;
    let (handle, mut events, task) = w.host.spawn();

    handle.trigger("app://sim").await.unwrap();
    handle.trigger("app://ghost").await.unwrap();
    handle.shutdown().await.unwrap();

    match events.recv().await.unwrap() {
        HostEvent::SessionCommitted(report) => assert_eq!(report.owner, owner("app://sim")),
        other => panic!("expected commit, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        HostEvent::SessionFailed { owner: o, error } => {
            assert_eq!(o, owner("app://ghost"));
            assert!(error.contains("store not found"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(matches!(events.recv().await.unwrap(), HostEvent::Stopped));

    task.await.unwrap();
    assert!(handle.trigger("app://sim").await.is_err());
}
