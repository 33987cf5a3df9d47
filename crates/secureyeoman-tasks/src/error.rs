//! Task error types.

use secureyeoman_core::{ErrorKind, YeomanError};
use thiserror::Error;

/// Errors from the task subsystem.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task not found.
    #[error("task not found: {0}")]
    NotFound(String),

    /// Operation not valid in the task's current state.
    #[error("invalid task state: {0}")]
    InvalidState(String),

    /// Persistence failed.
    #[error("task storage unavailable: {0}")]
    Storage(String),

    /// Audit recording failed.
    #[error("audit error: {0}")]
    Audit(#[from] secureyeoman_audit::AuditError),

    /// The handler failed.
    #[error("handler error: {0}")]
    Handler(String),
}

impl From<TaskError> for YeomanError {
    fn from(err: TaskError) -> Self {
        let kind = match &err {
            TaskError::NotFound(_) => ErrorKind::NotFound,
            TaskError::InvalidState(_) => ErrorKind::PreconditionFailed,
            TaskError::Storage(_) | TaskError::Audit(_) => ErrorKind::StorageUnavailable,
            TaskError::Handler(_) => ErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

/// Result type for task operations.
pub type TaskResult<T> = Result<T, TaskError>;
