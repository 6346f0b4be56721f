use contacts_types::StoreOwner;
use serde::{Deserialize, Serialize};

/// Well-known owner identity of the legacy contacts API, which is also the
/// primary store whose fields win merge conflicts.
pub const LEGACY_CONTACTS_OWNER: &str = "mozContacts";

/// Store kind requested from platform discovery.
pub const CONTACTS_STORE_KIND: &str = "contacts";

/// Configuration for the sync core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Kind of provider store to discover.
    pub store_kind: String,
    /// Store whose record goes first into the merger.
    pub primary_owner: StoreOwner,
    /// Owner identity given to the legacy contacts API wrapper.
    pub legacy_owner: StoreOwner,
    /// How many times a checkpoint write is attempted before giving up.
    pub checkpoint_write_attempts: u32,
    /// Pause between checkpoint write attempts (ms).
    pub checkpoint_retry_delay_ms: u64,
    /// Capacity of the host command and event channels.
    pub event_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_kind: CONTACTS_STORE_KIND.to_string(),
            primary_owner: StoreOwner::new(LEGACY_CONTACTS_OWNER),
            legacy_owner: StoreOwner::new(LEGACY_CONTACTS_OWNER),
            checkpoint_write_attempts: 3,
            checkpoint_retry_delay_ms: 50,
            event_buffer: 64,
        }
    }
}
