//! Shared pieces of the contacts agent: fixture loading, configuration and
//! the trigger loop.
//!
//! The agent stands in for the platform. Provider stores come from a JSON
//! fixture file and live in memory. The aggregated index and the checkpoints
//! both go to SQLite files, so a restart resumes from checkpoints that still
//! match what the index holds.

use anyhow::{Context, Result};
use contacts_storage::{CheckpointStore, SqliteCheckpointStore, SqliteEntryStore};
use contacts_sync::memory::{MemoryLegacyContacts, MemoryProviderStore, StaticDiscovery};
use contacts_sync::{StoreRegistry, StoredIndex, SyncConfig, SyncHost, TriggerMessage};
use contacts_types::ContactRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

/// One provider store in a fixture file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFixture {
    pub owner: String,
    /// Store kind; defaults to the configured kind.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub records: Vec<Value>,
}

/// Contents of a fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub stores: Vec<StoreFixture>,
    /// Contacts held by the legacy contacts API.
    #[serde(default)]
    pub legacy: Vec<Value>,
}

impl Fixtures {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse fixtures")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixtures {}", path.display()))?;
        Self::from_json(&raw)
    }
}

/// Loads the sync configuration, falling back to defaults without a file.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&raw).context("Failed to parse config")
        }
        None => Ok(SyncConfig::default()),
    }
}

/// Builds the store registry described by `fixtures`.
pub fn build_registry(fixtures: &Fixtures, config: &SyncConfig) -> Result<StoreRegistry> {
    let discovery = Arc::new(StaticDiscovery::new());
    for fixture in &fixtures.stores {
        let store = MemoryProviderStore::new(fixture.owner.as_str());
        for raw in &fixture.records {
            let record = ContactRecord::from_value(raw.clone())
                .with_context(|| format!("Bad record in store {}", fixture.owner))?;
            store.put(record)?;
        }
        let kind = fixture.kind.as_deref().unwrap_or(&config.store_kind);
        info!("Loaded {} record(s) into {} ({})", store.len(), fixture.owner, kind);
        discovery.register(kind, Arc::new(store))?;
    }

    let legacy = MemoryLegacyContacts::new();
    for raw in &fixtures.legacy {
        let record = ContactRecord::from_value(raw.clone()).context("Bad legacy record")?;
        legacy.save(record)?;
    }

    Ok(StoreRegistry::new(discovery, config).with_legacy(Arc::new(legacy)))
}

/// On-disk state of the agent.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub checkpoints: PathBuf,
    pub index: PathBuf,
}

/// Forgets every checkpoint so the next session of each store replays a
/// full snapshot. Returns how many were dropped.
pub fn reset_checkpoints(checkpoints: &SqliteCheckpointStore) -> Result<usize> {
    let all = checkpoints.all().context("Failed to list checkpoints")?;
    for (owner, _) in &all {
        checkpoints
            .clear(owner)
            .with_context(|| format!("Failed to clear checkpoint of {owner}"))?;
    }
    Ok(all.len())
}

/// Opens the persisted index and checkpoints and starts a host over them.
///
/// With `resync`, checkpoints are dropped first; each store's snapshot
/// starts with `clear`, so the index is rebuilt rather than duplicated.
pub async fn open_host(
    registry: Arc<StoreRegistry>,
    config: SyncConfig,
    paths: &StatePaths,
    resync: bool,
) -> Result<SyncHost> {
    let checkpoints = SqliteCheckpointStore::open(&paths.checkpoints)
        .context("Failed to open checkpoint database")?;
    let entries =
        SqliteEntryStore::open(&paths.index).context("Failed to open index database")?;

    if resync {
        let dropped = reset_checkpoints(&checkpoints)?;
        info!("Dropped {} checkpoint(s), stores will resync", dropped);
    }

    let index = StoredIndex::new(Arc::new(entries));
    SyncHost::start(registry, Arc::new(checkpoints), Arc::new(index), config)
        .await
        .context("Failed to start sync host")
}

/// Counts of what the trigger loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub committed: usize,
    pub failed: usize,
    pub malformed: usize,
}

/// Reads one JSON trigger per line and runs a session for each, in order.
///
/// With `exit_on_commit`, returns right after the first committed session.
pub async fn run_triggers<R>(host: &SyncHost, reader: R, exit_on_commit: bool) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = RunSummary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read trigger")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let trigger = match TriggerMessage::from_json(line) {
            Ok(t) => t,
            Err(e) => {
                warn!("Ignoring trigger: {}", e);
                summary.malformed += 1;
                continue;
            }
        };

        match host.handle_trigger(&trigger).await {
            Ok(report) => {
                info!(
                    "Session for {} committed at {}",
                    report.owner, report.committed_revision
                );
                summary.committed += 1;
                if exit_on_commit {
                    break;
                }
            }
            Err(e) => {
                error!("Session for {} failed: {}", trigger.owner, e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
