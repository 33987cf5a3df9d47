//! Soul error types.

use secureyeoman_core::{ErrorKind, YeomanError};
use thiserror::Error;

/// Errors from the soul subsystem.
#[derive(Debug, Error)]
pub enum SoulError {
    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not valid in the entity's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Persistence failed.
    #[error("soul storage unavailable: {0}")]
    Storage(String),
}

impl From<SoulError> for YeomanError {
    fn from(err: SoulError) -> Self {
        let kind = match &err {
            SoulError::NotFound(_) => ErrorKind::NotFound,
            SoulError::InvalidState(_) => ErrorKind::PreconditionFailed,
            SoulError::Storage(_) => ErrorKind::StorageUnavailable,
        };
        Self::new(kind, err.to_string())
    }
}

/// Result type for soul operations.
pub type SoulResult<T> = Result<T, SoulError>;
