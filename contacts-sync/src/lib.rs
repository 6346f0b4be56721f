//! Provider store sync and cross-store contact resolution.
//!
//! Contact providers each keep their own data store. This crate keeps the
//! aggregated contact index in step with those stores and resolves an
//! aggregate id back into one merged contact.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Provider**: traits the platform implements for stores and discovery
//! - **Registry**: discovers stores once and caches them by owner
//! - **Walker**: drains a store's change cursor into the index
//! - **Resolver**: fetches the records behind an aggregate entry and merges them
//! - **Host**: context object tying the above together for one process
//!
//! ## Sync Process
//!
//! 1. **Trigger**: a `{owner}` message arrives at the host
//! 2. **Lookup**: the registry finds the owner's store (one rediscovery on miss)
//! 3. **Open**: the walker opens a cursor from the stored checkpoint
//! 4. **Drain**: tasks are forwarded to the index in provider order
//! 5. **Commit**: on `done`, the store's revision becomes the new checkpoint
//!
//! # Example
//!
//! ```
//! use contacts_sync::{SyncConfig, StoreRegistry};
//! use contacts_sync::memory::StaticDiscovery;
//! use std::sync::Arc;
//!
//! let config = SyncConfig::default();
//! let registry = StoreRegistry::new(Arc::new(StaticDiscovery::new()), &config);
//! assert_eq!(registry.kind(), "contacts");
//! ```

mod config;
mod error;
pub mod host;
pub mod index;
pub mod memory;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod stored;
pub mod walker;

pub use config::{SyncConfig, CONTACTS_STORE_KIND, LEGACY_CONTACTS_OWNER};
pub use error::{SyncError, SyncResult};
pub use host::{HostCommand, HostEvent, HostHandle, SyncHost, TriggerMessage};
pub use index::{apply_task, AggregatedIndex};
pub use provider::{
    LegacyContactsApi, LegacyStore, ProviderStore, StoreDiscovery, SyncCursor, TaskQueueCursor,
};
pub use registry::{StoreMap, StoreRegistry};
pub use resolver::{ContactResolver, MatchingCandidate, Merger};
pub use stored::StoredIndex;
pub use walker::{Session, SessionReport, SessionState, Walker};
