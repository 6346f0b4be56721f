//! Aggregate entries: the index's view of one real-world contact.
//!
//! An entry lists, in order, the provider-store records that contribute to
//! the contact. Its shape comes from the aggregated index as loose JSON, so
//! parsing is lenient about individual pointers and strict about the entry.

use crate::{Error, Result, StoreOwner};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A pointer from an aggregate entry into one provider store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPointer {
    /// Owner of the store holding the record.
    pub origin: StoreOwner,
    /// Record id inside that store.
    pub uid: String,
}

impl EntryPointer {
    pub fn new(origin: impl Into<StoreOwner>, uid: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            uid: uid.into(),
        }
    }

    /// Reads a pointer out of loose JSON. Returns `None` unless both `origin`
    /// and `uid` are present strings.
    fn from_value(value: &Value) -> Option<Self> {
        let origin = value.get("origin")?.as_str()?;
        let uid = value.get("uid")?.as_str()?;
        Some(Self::new(origin, uid))
    }
}

/// A validated aggregate entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateEntry {
    /// The aggregate id handed out by the index.
    pub id: String,
    /// Complete pointers, in index order.
    #[serde(rename = "entryData")]
    pub pointers: Vec<EntryPointer>,
    /// Number of pointers dropped while parsing because a field was missing.
    #[serde(skip)]
    pub skipped_pointers: usize,
}

impl AggregateEntry {
    pub fn new(id: impl Into<String>, pointers: Vec<EntryPointer>) -> Self {
        Self {
            id: id.into(),
            pointers,
            skipped_pointers: 0,
        }
    }

    /// Validates an entry coming from the index.
    ///
    /// Fails with [`Error::InvalidEntry`] when `id` is missing (or neither a
    /// string nor a number) or `entryData` is not a list. Pointers missing
    /// `origin` or `uid` are dropped and counted in `skipped_pointers`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let id = match value.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(Error::InvalidEntry(format!("unsupported id: {other}")));
            }
            None => return Err(Error::InvalidEntry("missing id".into())),
        };

        let raw = match value.get("entryData") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(Error::InvalidEntry(format!(
                    "entryData is not a list: {other}"
                )));
            }
            None => return Err(Error::InvalidEntry("missing entryData".into())),
        };

        let pointers: Vec<EntryPointer> = raw.iter().filter_map(EntryPointer::from_value).collect();
        let skipped_pointers = raw.len() - pointers.len();

        Ok(Self {
            id,
            pointers,
            skipped_pointers,
        })
    }

    /// Returns the uid of the first pointer into `primary`, if any.
    pub fn primary_uid(&self, primary: &StoreOwner) -> Option<&str> {
        self.pointers
            .iter()
            .find(|p| &p.origin == primary)
            .map(|p| p.uid.as_str())
    }
}
