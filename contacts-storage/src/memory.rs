use crate::{CheckpointStore, StorageError, StorageResult};
use contacts_types::{RevisionId, StoreOwner};
use std::collections::HashMap;
use std::sync::RwLock;

/// Checkpoints kept in process memory. Lost on restart, which simply means
/// every store is resynchronized from scratch.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<StoreOwner, RevisionId>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of owners with a checkpoint.
    pub fn len(&self) -> usize {
        self.checkpoints.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn get(&self, owner: &StoreOwner) -> StorageResult<Option<RevisionId>> {
        let checkpoints = self
            .checkpoints
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(checkpoints.get(owner).cloned())
    }

    fn set(&self, owner: &StoreOwner, revision: &RevisionId) -> StorageResult<()> {
        self.checkpoints
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .insert(owner.clone(), revision.clone());
        Ok(())
    }

    fn clear(&self, owner: &StoreOwner) -> StorageResult<()> {
        self.checkpoints
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .remove(owner);
        Ok(())
    }
}
