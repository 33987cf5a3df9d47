//! API error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use secureyeoman_core::{ErrorKind, YeomanError};
use serde_json::json;
use tracing::error;

/// An error leaving the HTTP surface. Always renders `{"error": "..."}`
/// with the taxonomy's status mapping; internal kinds get a sanitized
/// message.
#[derive(Debug)]
pub struct ApiError(pub YeomanError);

impl ApiError {
    /// Unauthenticated shorthand.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self(YeomanError::new(ErrorKind::Unauthenticated, message))
    }

    /// Forbidden shorthand.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self(YeomanError::new(ErrorKind::Unauthorized, message))
    }

    /// Bad-request shorthand.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(YeomanError::invalid_input(message))
    }
}

impl From<YeomanError> for ApiError {
    fn from(err: YeomanError) -> Self {
        Self(err)
    }
}

macro_rules! from_subsystem_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ApiError {
                fn from(err: $ty) -> Self {
                    Self(err.into())
                }
            }
        )*
    };
}

from_subsystem_error!(
    secureyeoman_audit::AuditError,
    secureyeoman_auth::AuthError,
    secureyeoman_soul::SoulError,
    secureyeoman_memory::MemoryError,
    secureyeoman_ai::AiError,
    secureyeoman_tasks::TaskError,
    secureyeoman_hooks::HookError,
    secureyeoman_integrations::IntegrationError,
);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // 5xx details stay in the logs; clients get a sanitized message.
        let message = if status.is_server_error() {
            error!(kind = %self.0.kind, detail = %self.0.message, "Internal error");
            "internal error".to_string()
        } else {
            self.0.message
        };

        (status, Json(json!({"error": message}))).into_response()
    }
}

/// Result alias for handlers.
pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = ApiError::unauthenticated("no token").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ApiError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ApiError(YeomanError::internal("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
