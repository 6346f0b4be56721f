//! Sync cursor walker - drains one provider store into the aggregated index.
//!
//! A session reads the store's checkpoint, opens a cursor from it and applies
//! every task in order. Only a successful `done` followed by a checkpoint
//! write commits the session; everything before that is replayed after a
//! crash, which is why index mutations must be idempotent.
//!
//! The new checkpoint is the revision the cursor was opened at. A write that
//! lands while the session drains is picked up by the next session.
//!
//! ```text
//! Idle -> CursorOpen -> Draining -> Committed -> Terminated
//!                         ^   |
//!                         +---+  one loop per task, task errors included
//! ```

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::index::{apply_task, AggregatedIndex};
use crate::provider::{ProviderStore, SyncCursor};
use contacts_storage::CheckpointStore;
use contacts_types::{RevisionId, StoreOwner, SyncTask, TaskOperation};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    CursorOpen,
    Draining,
    Committed,
    Terminated,
}

/// Outcome of a committed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Store that was drained.
    pub owner: StoreOwner,
    /// Checkpoint the cursor was opened from.
    pub since: Option<RevisionId>,
    /// Tasks the index accepted (including `done`).
    pub applied: usize,
    /// Tasks the index rejected. Their effect is lost.
    pub rejected: usize,
    /// Tasks with an unrecognized operation.
    pub unknown: usize,
    /// Revision the cursor was opened at, written as the new checkpoint.
    pub committed_revision: RevisionId,
}

/// Drives provider cursors into the aggregated index.
pub struct Walker {
    index: Arc<dyn AggregatedIndex>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: SyncConfig,
}

impl Walker {
    pub fn new(
        index: Arc<dyn AggregatedIndex>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            index,
            checkpoints,
            config,
        }
    }

    /// Runs a full session for `store`: open, drain, commit.
    pub async fn run(&self, store: Arc<dyn ProviderStore>) -> SyncResult<SessionReport> {
        let mut session = self.open(store).await?;
        session.drain().await
    }

    /// Reads the checkpoint and opens the store's cursor from it.
    pub async fn open(&self, store: Arc<dyn ProviderStore>) -> SyncResult<Session<'_>> {
        let owner = store.owner().clone();
        let since = self.read_checkpoint(&owner).await?;
        debug!("Opening cursor for {} since {:?}", owner, since);

        let cursor = store.sync(since.as_ref()).await?;
        Ok(Session {
            walker: self,
            store,
            cursor,
            since,
            state: SessionState::CursorOpen,
            applied: 0,
            rejected: 0,
            unknown: 0,
        })
    }

    /// Returns the persisted checkpoint for `owner`.
    pub async fn read_checkpoint(&self, owner: &StoreOwner) -> SyncResult<Option<RevisionId>> {
        let checkpoints = self.checkpoints.clone();
        let owner = owner.clone();
        let revision = tokio::task::spawn_blocking(move || checkpoints.get(&owner))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))??;
        Ok(revision)
    }

    /// Writes the checkpoint, retrying up to the configured number of
    /// attempts. On final failure the previous checkpoint stays in place.
    async fn write_checkpoint(&self, owner: &StoreOwner, revision: &RevisionId) -> SyncResult<()> {
        let attempts = self.config.checkpoint_write_attempts.max(1);
        let delay = Duration::from_millis(self.config.checkpoint_retry_delay_ms);
        let mut attempt = 1;

        loop {
            let checkpoints = self.checkpoints.clone();
            let (o, r) = (owner.clone(), revision.clone());
            let result = tokio::task::spawn_blocking(move || checkpoints.set(&o, &r))
                .await
                .map_err(|e| SyncError::Task(e.to_string()))?;

            match result {
                Ok(()) => return Ok(()),
                Err(source) if attempt >= attempts => {
                    return Err(SyncError::Checkpoint {
                        owner: owner.clone(),
                        attempts,
                        source,
                    });
                }
                Err(e) => {
                    warn!(
                        "Checkpoint write for {} failed (attempt {}/{}): {}",
                        owner, attempt, attempts, e
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// One open cursor being drained.
pub struct Session<'w> {
    walker: &'w Walker,
    store: Arc<dyn ProviderStore>,
    cursor: Box<dyn SyncCursor>,
    since: Option<RevisionId>,
    state: SessionState,
    applied: usize,
    rejected: usize,
    unknown: usize,
}

impl Session<'_> {
    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Owner of the store being drained.
    pub fn owner(&self) -> &StoreOwner {
        self.store.owner()
    }

    /// Pulls tasks until `done` commits the session.
    ///
    /// Rejected tasks and unknown operations are logged and skipped. Cursor
    /// errors, a rejected `done`, a failed checkpoint write or a cursor that
    /// ends without `done` fail the session and leave the checkpoint as it
    /// was.
    pub async fn drain(&mut self) -> SyncResult<SessionReport> {
        self.state = SessionState::Draining;

        while let Some(task) = self.cursor.next().await? {
            match &task.operation {
                TaskOperation::Done => return self.commit(&task).await,
                TaskOperation::Unknown(raw) => {
                    warn!(
                        "Skipping task with unknown operation '{}' from {}",
                        raw,
                        self.owner()
                    );
                    self.unknown += 1;
                }
                _ => self.apply(&task).await,
            }
        }

        Err(SyncError::CursorExhausted(self.owner().clone()))
    }

    async fn apply(&mut self, task: &SyncTask) {
        match apply_task(self.walker.index.as_ref(), self.store.as_ref(), task).await {
            Ok(_) => {
                debug!("Applied {} {:?} from {}", task.operation, task.id, self.owner());
                self.applied += 1;
            }
            Err(e) => {
                warn!(
                    "Index rejected {} {:?} from {}: {}",
                    task.operation,
                    task.id,
                    self.owner(),
                    e
                );
                self.rejected += 1;
            }
        }
    }

    async fn commit(&mut self, done: &SyncTask) -> SyncResult<SessionReport> {
        apply_task(self.walker.index.as_ref(), self.store.as_ref(), done).await?;
        self.applied += 1;

        let revision = self.cursor.revision().clone();
        self.walker
            .write_checkpoint(self.store.owner(), &revision)
            .await?;
        self.state = SessionState::Committed;

        info!(
            "Synced {} up to {} ({} applied, {} rejected, {} unknown)",
            self.owner(),
            revision,
            self.applied,
            self.rejected,
            self.unknown
        );

        let report = SessionReport {
            owner: self.owner().clone(),
            since: self.since.clone(),
            applied: self.applied,
            rejected: self.rejected,
            unknown: self.unknown,
            committed_revision: revision,
        };
        self.state = SessionState::Terminated;
        Ok(report)
    }
}
