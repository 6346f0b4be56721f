//! Sync tasks produced by a provider store's change cursor.
//!
//! A cursor yields tasks in the order the provider applied the mutations,
//! terminated by a `done` task. Operations arrive as lowercase strings on
//! the wire; anything unrecognized decodes into [`TaskOperation::Unknown`]
//! so the walker can log it and keep going.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of change a [`SyncTask`] carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskOperation {
    /// A record was added.
    Add,
    /// A record was updated.
    Update,
    /// A record was removed.
    Remove,
    /// Every record of the store was dropped.
    Clear,
    /// End of the pending changes for this revision.
    Done,
    /// An operation this core does not know. Keeps the raw wire value.
    Unknown(String),
}

impl TaskOperation {
    /// Returns the wire name of the operation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Clear => "clear",
            Self::Done => "done",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether this operation mutates the aggregated index.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Add | Self::Update | Self::Remove | Self::Clear)
    }
}

impl From<&str> for TaskOperation {
    fn from(raw: &str) -> Self {
        match raw {
            "add" => Self::Add,
            "update" => Self::Update,
            "remove" => Self::Remove,
            "clear" => Self::Clear,
            "done" => Self::Done,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for TaskOperation {
    fn from(raw: String) -> Self {
        match Self::from(raw.as_str()) {
            Self::Unknown(_) => Self::Unknown(raw),
            known => known,
        }
    }
}

impl From<TaskOperation> for String {
    fn from(op: TaskOperation) -> Self {
        match op {
            TaskOperation::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending change from a provider store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    pub operation: TaskOperation,
    /// Record id inside the provider store. Absent for `clear` and `done`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Record payload for `add`/`update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SyncTask {
    /// Creates a task with an arbitrary operation.
    pub fn new(operation: TaskOperation, id: Option<String>, data: Option<Value>) -> Self {
        Self { operation, id, data }
    }

    pub fn add(id: impl Into<String>, data: Value) -> Self {
        Self::new(TaskOperation::Add, Some(id.into()), Some(data))
    }

    pub fn update(id: impl Into<String>, data: Value) -> Self {
        Self::new(TaskOperation::Update, Some(id.into()), Some(data))
    }

    pub fn remove(id: impl Into<String>) -> Self {
        Self::new(TaskOperation::Remove, Some(id.into()), None)
    }

    pub fn clear() -> Self {
        Self::new(TaskOperation::Clear, None, None)
    }

    pub fn done() -> Self {
        Self::new(TaskOperation::Done, None, None)
    }

    /// Whether this task terminates the cursor.
    pub fn is_done(&self) -> bool {
        self.operation == TaskOperation::Done
    }
}
