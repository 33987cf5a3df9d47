//! Auth error types.

use secureyeoman_core::{ErrorKind, YeomanError};
use thiserror::Error;

/// Errors from the auth subsystem.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Supplied credentials did not verify.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A rate-limit rule rejected the request before credential checking.
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Milliseconds until the window resets.
        retry_after_ms: i64,
    },

    /// Token is missing, malformed, expired, or blacklisted.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// A consumed refresh token was presented again.
    #[error("refresh token reuse detected")]
    TokenReuse,

    /// The principal lacks a required permission.
    #[error("permission denied: {action} on {resource}")]
    PermissionDenied {
        /// Requested resource.
        resource: String,
        /// Requested action.
        action: String,
    },

    /// Role graph problem (unknown role, cycle, builtin deletion).
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// Role not found.
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// Password hashing backend failed.
    #[error("credential hashing failed: {0}")]
    Hashing(String),

    /// Persistence failed.
    #[error("auth storage unavailable: {0}")]
    Storage(String),

    /// Audit recording failed.
    #[error("audit error: {0}")]
    Audit(#[from] secureyeoman_audit::AuditError),
}

impl From<AuthError> for YeomanError {
    fn from(err: AuthError) -> Self {
        let kind = match &err {
            AuthError::InvalidCredentials | AuthError::InvalidToken(_) | AuthError::TokenReuse => {
                ErrorKind::Unauthenticated
            },
            AuthError::RateLimited { .. } => ErrorKind::RateLimited,
            AuthError::PermissionDenied { .. } => ErrorKind::Unauthorized,
            AuthError::InvalidRole(_) => ErrorKind::InvalidInput,
            AuthError::RoleNotFound(_) => ErrorKind::NotFound,
            AuthError::Hashing(_) => ErrorKind::Internal,
            AuthError::Storage(_) | AuthError::Audit(_) => ErrorKind::StorageUnavailable,
        };
        Self::new(kind, err.to_string())
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
