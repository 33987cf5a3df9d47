//! Hook error types.

use secureyeoman_core::{ErrorKind, YeomanError};
use thiserror::Error;

/// Errors from the hook subsystem.
#[derive(Debug, Error)]
pub enum HookError {
    /// Registration or webhook not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad registration input.
    #[error("invalid hook: {0}")]
    Invalid(String),

    /// Persistence failed.
    #[error("hook storage unavailable: {0}")]
    Storage(String),

    /// Webhook delivery failed.
    #[error("webhook delivery failed: {0}")]
    Delivery(String),
}

impl From<HookError> for YeomanError {
    fn from(err: HookError) -> Self {
        let kind = match &err {
            HookError::NotFound(_) => ErrorKind::NotFound,
            HookError::Invalid(_) => ErrorKind::InvalidInput,
            HookError::Storage(_) => ErrorKind::StorageUnavailable,
            HookError::Delivery(_) => ErrorKind::Network,
        };
        Self::new(kind, err.to_string())
    }
}

/// Result type for hook operations.
pub type HookResult<T> = Result<T, HookError>;
