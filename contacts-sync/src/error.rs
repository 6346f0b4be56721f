//! Error types for the sync layer.

use contacts_storage::StorageError;
use contacts_types::StoreOwner;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync and resolution.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No provider store with this owner, even after re-discovery.
    #[error("store not found: {0}")]
    StoreNotFound(StoreOwner),

    /// Platform discovery failed.
    #[error("discovery error: {0}")]
    Discovery(String),

    /// A provider store failed to answer.
    #[error("provider error: {0}")]
    Provider(String),

    /// A provider store has no record for a pointer.
    #[error("record {uid} not found in store {origin}")]
    RecordNotFound { origin: StoreOwner, uid: String },

    /// Malformed aggregate entry.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    /// The aggregated index rejected an operation.
    #[error("index error: {0}")]
    Index(String),

    /// The merger rejected the records.
    #[error("merge error: {0}")]
    Merge(String),

    /// Checkpoint could not be written; the previous checkpoint is kept.
    #[error("checkpoint for {owner} not written after {attempts} attempt(s): {source}")]
    Checkpoint {
        owner: StoreOwner,
        attempts: u32,
        #[source]
        source: StorageError,
    },

    /// Storage error outside of a checkpoint commit.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The cursor ran out of tasks before `done`.
    #[error("cursor for {0} exhausted before done")]
    CursorExhausted(StoreOwner),

    /// Protocol error (invalid message format).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

impl From<contacts_types::Error> for SyncError {
    fn from(err: contacts_types::Error) -> Self {
        match err {
            contacts_types::Error::InvalidEntry(msg) => Self::InvalidEntry(msg),
            contacts_types::Error::InvalidRecord(msg) => Self::Provider(msg),
            contacts_types::Error::Serialization(e) => Self::Serialization(e),
        }
    }
}
