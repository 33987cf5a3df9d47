//! Authentication middleware.
//!
//! Every non-auth endpoint requires either `Authorization: Bearer <token>`
//! or `X-API-Key: <key>`. The resolved [`Principal`] is attached as a
//! request extension for handlers and RBAC checks.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use secureyeoman_auth::Principal;

use crate::error::ApiError;
use crate::state::AppState;

/// Resolve the caller's principal or fail with 401.
pub(crate) async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = authenticate(&state, &request).await?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

async fn authenticate(state: &AppState, request: &Request) -> Result<Principal, ApiError> {
    if let Some(bearer) = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return state
            .auth
            .authenticate_bearer(bearer)
            .map_err(ApiError::from);
    }

    if let Some(key) = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
    {
        return state
            .auth
            .authenticate_api_key(key)
            .await
            .map_err(ApiError::from);
    }

    Err(ApiError::unauthenticated("missing credentials"))
}

/// RBAC gate used by write handlers: check, 403 on denial (the denial is
/// audited inside the auth service).
pub(crate) async fn require_permission(
    state: &AppState,
    principal: &Principal,
    resource: &str,
    action: &str,
) -> Result<(), ApiError> {
    let check = state
        .auth
        .check_permission(
            principal.role,
            &secureyeoman_auth::PermissionRequest::new(resource, action),
            &principal.id,
        )
        .await?;
    if check.granted {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            check.reason.unwrap_or_else(|| "permission denied".into()),
        ))
    }
}
