//! Task records.

use secureyeoman_core::{TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, not yet running.
    Queued,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

/// What a caller submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Task type tag (`QUERY`, `SCHEDULED`, …).
    pub task_type: String,
    /// Short name.
    pub name: String,
    /// Longer description.
    pub description: String,
    /// Structured input.
    pub input: Value,
}

impl TaskDefinition {
    /// Create a definition.
    #[must_use]
    pub fn new(
        task_type: impl Into<String>,
        name: impl Into<String>,
        input: Value,
    ) -> Self {
        Self {
            task_type: task_type.into(),
            name: name.into(),
            description: String::new(),
            input,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A persisted task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique identifier.
    pub id: TaskId,
    /// Task type tag.
    pub task_type: String,
    /// Short name.
    pub name: String,
    /// Longer description.
    pub description: String,
    /// Structured input.
    pub input: Value,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Result, once completed.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error message, if failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last state change.
    pub updated_at: Timestamp,
}

impl TaskRecord {
    /// Create a queued record from a definition.
    #[must_use]
    pub fn from_definition(def: TaskDefinition) -> Self {
        let now = Timestamp::now();
        Self {
            id: TaskId::new(),
            task_type: def.task_type,
            name: def.name,
            description: def.description,
            input: def.input,
            status: TaskStatus::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the task has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}
