//! Identifier types used throughout the contacts core.
//!
//! Provider identities and revisions are opaque strings handed to us by the
//! platform. The newtypes only exist so the two are never confused.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identity of the application that owns a provider store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreOwner(String);

impl StoreOwner {
    /// Creates an owner identity from any string-like value.
    pub fn new(owner: impl Into<String>) -> Self {
        Self(owner.into())
    }

    /// Returns the owner identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoreOwner {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StoreOwner {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for StoreOwner {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque revision token of a provider store.
///
/// Tokens are only ever compared for equality and handed back to the store
/// that produced them; no ordering is assumed across stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    /// Wraps a revision token.
    pub fn new(revision: impl Into<String>) -> Self {
        Self(revision.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RevisionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
