//! Revision checkpoint storage for the contacts aggregation core.
//!
//! A checkpoint records, per provider store, the last revision whose changes
//! were fully applied to the aggregated index. The sync walker reads it to
//! open a cursor and writes it only after a session's `done` task succeeded.
//!
//! # Backends
//!
//! - [`SqliteCheckpointStore`]: durable, one row per store owner
//! - [`MemoryCheckpointStore`]: process-local, for tests and dry runs
//!
//! [`SqliteEntryStore`] keeps index entries on disk for hosts whose
//! checkpoints outlive the process.

mod entries;
mod error;
mod memory;
mod sqlite;

pub use entries::SqliteEntryStore;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

use contacts_types::{RevisionId, StoreOwner};

/// Durable key/value record of "last synchronized revision" per store owner.
///
/// Implementations are blocking; async callers go through
/// `tokio::task::spawn_blocking`.
pub trait CheckpointStore: Send + Sync {
    /// Returns the checkpoint for `owner`, or `None` if the store was never
    /// synchronized.
    fn get(&self, owner: &StoreOwner) -> StorageResult<Option<RevisionId>>;

    /// Records `revision` as the checkpoint for `owner`, replacing any
    /// previous value.
    fn set(&self, owner: &StoreOwner, revision: &RevisionId) -> StorageResult<()>;

    /// Forgets the checkpoint for `owner`, forcing a full resync next time.
    fn clear(&self, owner: &StoreOwner) -> StorageResult<()>;
}
