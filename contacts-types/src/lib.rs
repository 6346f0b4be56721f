//! Core type definitions for the contacts aggregation core.
//!
//! This crate defines the plain data types shared by the checkpoint store,
//! the sync walker and the resolver:
//! - Provider store identities and opaque revision tokens
//! - Contact records as they come out of a provider store
//! - Sync tasks produced by a provider store's change cursor
//! - Aggregate entries (pointers from the aggregated index into provider stores)
//!
//! Field-level contact semantics are owned by the providers and the merger,
//! not by this crate.

mod entry;
mod ids;
mod record;
mod task;

pub use entry::{AggregateEntry, EntryPointer};
pub use ids::{RevisionId, StoreOwner};
pub use record::ContactRecord;
pub use task::{SyncTask, TaskOperation};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid aggregate entry: {0}")]
    InvalidEntry(String),

    #[error("invalid contact record: {0}")]
    InvalidRecord(String),
}
