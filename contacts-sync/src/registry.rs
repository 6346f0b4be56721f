//! Store registry - discovers provider stores and caches them by owner.
//!
//! Discovery is expensive, so its result is memoized for the registry's
//! lifetime. The only invalidation is a miss: `find` re-discovers exactly
//! once before giving up.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::provider::{LegacyContactsApi, LegacyStore, ProviderStore, StoreDiscovery};
use contacts_types::StoreOwner;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Stores keyed by owner.
pub type StoreMap = HashMap<StoreOwner, Arc<dyn ProviderStore>>;

/// Discovers and caches provider stores.
pub struct StoreRegistry {
    discovery: Arc<dyn StoreDiscovery>,
    legacy: Option<Arc<dyn LegacyContactsApi>>,
    kind: String,
    legacy_owner: StoreOwner,
    cache: RwLock<Option<StoreMap>>,
    discoveries: AtomicUsize,
}

impl StoreRegistry {
    /// Creates a registry over the platform discovery, without a legacy API.
    pub fn new(discovery: Arc<dyn StoreDiscovery>, config: &SyncConfig) -> Self {
        Self {
            discovery,
            legacy: None,
            kind: config.store_kind.clone(),
            legacy_owner: config.legacy_owner.clone(),
            cache: RwLock::new(None),
            discoveries: AtomicUsize::new(0),
        }
    }

    /// Adds the legacy contacts API, exposed under the configured legacy owner.
    #[must_use]
    pub fn with_legacy(mut self, api: Arc<dyn LegacyContactsApi>) -> Self {
        self.legacy = Some(api);
        self
    }

    /// The store kind `find` discovers.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// How many full discoveries ran so far.
    pub fn discovery_count(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }

    /// Runs a full discovery for `kind`, replaces the cache and returns the
    /// stores found, including the legacy wrapper.
    pub async fn resolve(&self, kind: &str) -> SyncResult<StoreMap> {
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        let discovered = self.discovery.discover(kind).await?;

        let mut stores: StoreMap = HashMap::with_capacity(discovered.len() + 1);
        for store in discovered {
            let owner = store.owner().clone();
            if stores.insert(owner.clone(), store).is_some() {
                warn!("Discovery returned two stores owned by {}, keeping the last", owner);
            }
        }

        if let Some(api) = &self.legacy {
            if stores.contains_key(&self.legacy_owner) {
                warn!(
                    "Discovered store already owned by {}, legacy wrapper skipped",
                    self.legacy_owner
                );
            } else {
                stores.insert(
                    self.legacy_owner.clone(),
                    Arc::new(LegacyStore::new(self.legacy_owner.clone(), api.clone())),
                );
            }
        }

        info!("Discovered {} {} store(s)", stores.len(), kind);
        *self.cache.write().await = Some(stores.clone());
        Ok(stores)
    }

    /// Returns the cached store for `owner` without discovering.
    pub async fn cached(&self, owner: &StoreOwner) -> Option<Arc<dyn ProviderStore>> {
        self.cache
            .read()
            .await
            .as_ref()
            .and_then(|stores| stores.get(owner).cloned())
    }

    /// Finds the store owned by `owner`.
    ///
    /// A cache miss triggers exactly one discovery. A second miss fails with
    /// [`SyncError::StoreNotFound`].
    pub async fn find(&self, owner: &StoreOwner) -> SyncResult<Arc<dyn ProviderStore>> {
        if let Some(store) = self.cached(owner).await {
            return Ok(store);
        }

        debug!("Store {} not cached, rediscovering", owner);
        let stores = self.resolve(&self.kind).await?;
        stores
            .get(owner)
            .cloned()
            .ok_or_else(|| SyncError::StoreNotFound(owner.clone()))
    }
}
