//! Cross-store contact resolver.
//!
//! Turns an aggregate entry (pointers into provider stores) into one contact.
//! A single pointer is returned as-is under the aggregate id. Several
//! pointers are fetched concurrently and handed to the external merger, with
//! the primary store's record first so its fields win conflicts.

use crate::error::{SyncError, SyncResult};
use crate::registry::StoreRegistry;
use async_trait::async_trait;
use contacts_types::{AggregateEntry, ContactRecord, EntryPointer, StoreOwner};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A record offered to the merger as matching the primary record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingCandidate {
    #[serde(rename = "matchingContact")]
    pub matching_contact: ContactRecord,
}

impl From<ContactRecord> for MatchingCandidate {
    fn from(record: ContactRecord) -> Self {
        Self {
            matching_contact: record,
        }
    }
}

/// Field-level merge of records that describe the same person.
#[async_trait]
pub trait Merger: Send + Sync {
    /// Merges `candidates` into `primary`. Fields of `primary` win conflicts.
    async fn in_memory_merge(
        &self,
        primary: ContactRecord,
        candidates: Vec<MatchingCandidate>,
    ) -> SyncResult<ContactRecord>;
}

/// Resolves aggregate entries into merged contacts.
#[derive(Clone)]
pub struct ContactResolver {
    registry: Arc<StoreRegistry>,
    merger: Arc<dyn Merger>,
    primary: StoreOwner,
}

impl ContactResolver {
    pub fn new(registry: Arc<StoreRegistry>, merger: Arc<dyn Merger>, primary: StoreOwner) -> Self {
        Self {
            registry,
            merger,
            primary,
        }
    }

    /// The store whose record leads the merge.
    pub fn primary(&self) -> &StoreOwner {
        &self.primary
    }

    /// Validates a raw entry from the index and resolves it.
    ///
    /// Fails with [`SyncError::InvalidEntry`] before any fetch when `id` is
    /// missing or `entryData` is not a list.
    pub async fn get_data(&self, entry: &Value) -> SyncResult<ContactRecord> {
        let entry = AggregateEntry::from_value(entry)?;
        if entry.skipped_pointers > 0 {
            debug!(
                "Entry {}: ignoring {} incomplete pointer(s)",
                entry.id, entry.skipped_pointers
            );
        }
        self.resolve(&entry).await
    }

    /// Resolves an already validated entry.
    pub async fn resolve(&self, entry: &AggregateEntry) -> SyncResult<ContactRecord> {
        if entry.pointers.is_empty() {
            return Err(SyncError::InvalidEntry(format!(
                "entry {} has no complete pointer",
                entry.id
            )));
        }

        let primary_uid = entry.primary_uid(&self.primary);
        let mut records = try_join_all(entry.pointers.iter().map(|p| self.fetch(p))).await?;

        if records.len() == 1 {
            let record = records.remove(0);
            return Ok(record.with_id(entry.id.as_str()));
        }

        // Pointer order and record order match, so the primary record sits at
        // the position of the first primary pointer.
        if let Some(pos) = entry.pointers.iter().position(|p| p.origin == self.primary) {
            let primary = records.remove(pos);
            records.insert(0, primary);
        }

        let first = records.remove(0);
        let candidates: Vec<MatchingCandidate> = records.into_iter().map(Into::into).collect();
        debug!(
            "Merging entry {} from {} records (primary uid {:?})",
            entry.id,
            candidates.len() + 1,
            primary_uid
        );

        let merged = self.merger.in_memory_merge(first, candidates).await?;
        Ok(merged.with_id(entry.id.as_str()))
    }

    async fn fetch(&self, pointer: &EntryPointer) -> SyncResult<ContactRecord> {
        let store = self.registry.find(&pointer.origin).await?;
        store
            .get(&pointer.uid)
            .await?
            .ok_or_else(|| SyncError::RecordNotFound {
                origin: pointer.origin.clone(),
                uid: pointer.uid.clone(),
            })
    }
}
