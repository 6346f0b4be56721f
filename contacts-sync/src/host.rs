//! Sync host - the context object owned by the hosting process.
//!
//! Holds everything that used to be process-wide state: the store registry,
//! the walker (index + checkpoints) and the per-owner session locks. The
//! host is created at startup, receives `{owner}` trigger messages and is
//! torn down explicitly.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::index::AggregatedIndex;
use crate::registry::StoreRegistry;
use crate::resolver::{ContactResolver, Merger};
use crate::walker::{SessionReport, Walker};
use contacts_storage::CheckpointStore;
use contacts_types::StoreOwner;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Inbound request to synchronize one provider store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerMessage {
    pub owner: StoreOwner,
}

impl TriggerMessage {
    pub fn new(owner: impl Into<StoreOwner>) -> Self {
        Self {
            owner: owner.into(),
        }
    }

    /// Decodes a trigger from its JSON wire form, `{"owner": "..."}`.
    pub fn from_json(raw: &str) -> SyncResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| SyncError::Protocol(format!("invalid trigger message: {e}")))
    }
}

/// Commands accepted by a spawned host.
#[derive(Debug, Clone)]
pub enum HostCommand {
    Trigger(TriggerMessage),
    Shutdown,
}

/// Events emitted by a spawned host.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// A session reached `done` and its checkpoint was written.
    SessionCommitted(SessionReport),
    /// A session stopped before committing.
    SessionFailed { owner: StoreOwner, error: String },
    /// The command loop ended.
    Stopped,
}

/// Sends commands to a spawned host.
#[derive(Debug, Clone)]
pub struct HostHandle {
    commands: mpsc::Sender<HostCommand>,
}

impl HostHandle {
    /// Queues a sync session for `owner`.
    pub async fn trigger(&self, owner: impl Into<StoreOwner>) -> SyncResult<()> {
        self.send(HostCommand::Trigger(TriggerMessage::new(owner)))
            .await
    }

    /// Asks the host to stop after the commands already queued.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.send(HostCommand::Shutdown).await
    }

    pub async fn send(&self, command: HostCommand) -> SyncResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }
}

/// Owns the sync core for the lifetime of the hosting process.
pub struct SyncHost {
    registry: Arc<StoreRegistry>,
    walker: Walker,
    config: SyncConfig,
    sessions: Mutex<HashMap<StoreOwner, Arc<Mutex<()>>>>,
}

impl SyncHost {
    /// Initializes the aggregated index and builds the host.
    pub async fn start(
        registry: Arc<StoreRegistry>,
        checkpoints: Arc<dyn CheckpointStore>,
        index: Arc<dyn AggregatedIndex>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        index.init().await?;
        info!("Sync host started for {} stores", config.store_kind);

        Ok(Self {
            registry,
            walker: Walker::new(index, checkpoints, config.clone()),
            config,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Builds a resolver over this host's registry.
    pub fn resolver(&self, merger: Arc<dyn Merger>) -> ContactResolver {
        ContactResolver::new(
            self.registry.clone(),
            merger,
            self.config.primary_owner.clone(),
        )
    }

    /// Runs one sync session for the triggering owner.
    ///
    /// Sessions for the same owner never overlap: a second trigger waits for
    /// the first to finish. Different owners run independently.
    pub async fn handle_trigger(&self, trigger: &TriggerMessage) -> SyncResult<SessionReport> {
        let store = self.registry.find(&trigger.owner).await?;

        let lock = self.session_lock(&trigger.owner).await;
        let _guard = lock.lock().await;
        debug!("Session for {} acquired", trigger.owner);

        self.walker.run(store).await
    }

    /// Whether a session for `owner` currently holds its lock.
    pub async fn is_session_running(&self, owner: &StoreOwner) -> bool {
        let sessions = self.sessions.lock().await;
        sessions
            .get(owner)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    async fn session_lock(&self, owner: &StoreOwner) -> Arc<Mutex<()>> {
        self.sessions
            .lock()
            .await
            .entry(owner.clone())
            .or_default()
            .clone()
    }

    /// Moves the host onto a tokio task that processes commands one at a
    /// time, in arrival order.
    pub fn spawn(self) -> (HostHandle, mpsc::Receiver<HostEvent>, JoinHandle<()>) {
        let buffer = self.config.event_buffer.max(1);
        let (cmd_tx, mut cmd_rx) = mpsc::channel(buffer);
        let (event_tx, event_rx) = mpsc::channel(buffer);

        let task = tokio::spawn(async move {
            while let Some(command) = cmd_rx.recv().await {
                let event = match command {
                    HostCommand::Trigger(trigger) => match self.handle_trigger(&trigger).await {
                        Ok(report) => HostEvent::SessionCommitted(report),
                        Err(e) => {
                            error!("Sync session for {} failed: {}", trigger.owner, e);
                            HostEvent::SessionFailed {
                                owner: trigger.owner,
                                error: e.to_string(),
                            }
                        }
                    },
                    HostCommand::Shutdown => break,
                };
                if event_tx.send(event).await.is_err() {
                    debug!("Host event receiver dropped");
                }
            }

            info!("Sync host stopped");
            let _ = event_tx.send(HostEvent::Stopped).await;
        });

        (HostHandle { commands: cmd_tx }, event_rx, task)
    }
}
