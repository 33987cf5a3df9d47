//! The process-wide error taxonomy.
//!
//! Every failure that crosses a subsystem boundary carries an [`ErrorKind`].
//! Subsystems keep their own `thiserror` enums internally; at the boundary
//! they surface a [`YeomanError`] so callers (and the HTTP layer) can act on
//! the kind without knowing which subsystem produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or rejected input.
    InvalidInput,
    /// Missing or invalid credentials.
    Unauthenticated,
    /// Authenticated but not permitted.
    Unauthorized,
    /// A local rate-limit rule rejected the request.
    RateLimited,
    /// Entity does not exist.
    NotFound,
    /// State conflict (duplicate, cycle, already-consumed token).
    Conflict,
    /// A precondition for the operation does not hold.
    PreconditionFailed,
    /// Daily token budget exhausted.
    TokenLimit,
    /// Provider-side rate limit.
    RateLimit,
    /// Provider is unavailable.
    ProviderUnavailable,
    /// Network failure talking to an external service.
    Network,
    /// Operation timed out.
    Timeout,
    /// External service returned an unparseable response.
    InvalidResponse,
    /// Provider rejected our credentials.
    Authentication,
    /// Audit chain linkage is broken.
    ChainBroken,
    /// A signature failed verification.
    SignatureInvalid,
    /// Persistence layer failed.
    StorageUnavailable,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth retrying locally.
    ///
    /// Matches the AI-gateway retry policy: provider rate limits, timeouts,
    /// network failures, and provider outages are transient.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Timeout | Self::Network | Self::ProviderUnavailable
        )
    }

    /// The HTTP status this kind maps to at the API boundary.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::Unauthenticated => 401,
            Self::Unauthorized => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::RateLimited => 429,
            _ => 500,
        }
    }

    /// Stable wire tag for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Unauthenticated => "unauthenticated",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::PreconditionFailed => "precondition_failed",
            Self::TokenLimit => "token_limit",
            Self::RateLimit => "rate_limit",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::InvalidResponse => "invalid_response",
            Self::Authentication => "authentication",
            Self::ChainBroken => "chain_broken",
            Self::SignatureInvalid => "signature_invalid",
            Self::StorageUnavailable => "storage_unavailable",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A kind-tagged error crossing a subsystem boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct YeomanError {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable detail. Sanitized before leaving the process.
    pub message: String,
}

impl YeomanError {
    /// Create an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for an `invalid_input` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Shorthand for a `not_found` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for an `internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Shorthand for a `storage_unavailable` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageUnavailable, message)
    }
}

/// Result type carrying a [`YeomanError`].
pub type YeomanResult<T> = Result<T, YeomanError>;
