//! AI gateway error types.

use secureyeoman_core::{ErrorKind, YeomanError};
use thiserror::Error;

/// Errors from providers and the gateway.
#[derive(Debug, Error)]
pub enum AiError {
    /// Provider-side rate limit.
    #[error("provider rate limit, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds the provider asked us to wait.
        retry_after_secs: u64,
    },

    /// Request timed out.
    #[error("provider request timed out after {timeout_ms}ms")]
    Timeout {
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// Network failure reaching the provider.
    #[error("network error: {0}")]
    Network(String),

    /// Provider returned a 5xx or is otherwise down.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider rejected our credentials.
    #[error("provider authentication failed: {0}")]
    Authentication(String),

    /// Daily token ceiling reached.
    #[error("daily token limit exceeded: {used} of {limit}")]
    TokenLimit {
        /// Tokens used today.
        used: u64,
        /// Configured ceiling.
        limit: u64,
    },

    /// Provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// No provider is configured for the request.
    #[error("no provider configured: {0}")]
    NotConfigured(String),
}

impl AiError {
    /// The taxonomy kind for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Network(_) => ErrorKind::Network,
            Self::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::TokenLimit { .. } => ErrorKind::TokenLimit,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::NotConfigured(_) => ErrorKind::PreconditionFailed,
        }
    }

    /// Whether the gateway should retry this error.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        self.kind().is_retriable()
    }

    /// Classify an HTTP status from a provider.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication(body),
            429 => Self::RateLimit {
                retry_after_secs: 1,
            },
            500..=599 => Self::ProviderUnavailable(body),
            _ => Self::InvalidResponse(format!("unexpected status {status}: {body}")),
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_ms: 0 }
        } else if err.is_connect() {
            Self::Network(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<AiError> for YeomanError {
    fn from(err: AiError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Result type for AI operations.
pub type AiResult<T> = Result<T, AiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        assert!(AiError::RateLimit { retry_after_secs: 1 }.is_retriable());
        assert!(AiError::Timeout { timeout_ms: 100 }.is_retriable());
        assert!(AiError::Network("reset".into()).is_retriable());
        assert!(AiError::ProviderUnavailable("503".into()).is_retriable());
        assert!(!AiError::Authentication("bad key".into()).is_retriable());
        assert!(!AiError::TokenLimit { used: 10, limit: 5 }.is_retriable());
        assert!(!AiError::InvalidResponse("garbage".into()).is_retriable());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            AiError::from_status(401, String::new()),
            AiError::Authentication(_)
        ));
        assert!(matches!(
            AiError::from_status(429, String::new()),
            AiError::RateLimit { .. }
        ));
        assert!(matches!(
            AiError::from_status(503, String::new()),
            AiError::ProviderUnavailable(_)
        ));
    }
}
