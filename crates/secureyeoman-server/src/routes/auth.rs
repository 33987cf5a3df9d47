//! Auth endpoints: login, refresh, logout, API keys.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use secureyeoman_auth::Principal;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_permission;
use crate::state::AppState;

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map_or_else(|| "local".to_string(), |ip| ip.trim().to_string())
}

#[derive(Deserialize)]
pub(crate) struct LoginBody {
    password: String,
}

pub(crate) async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<Value>> {
    let pair = state.auth.login(&body.password, &client_ip(&headers)).await?;
    Ok(Json(json!({
        "accessToken": pair.access_token,
        "refreshToken": pair.refresh_token,
        "expiresIn": pair.expires_in,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshBody {
    refresh_token: String,
}

pub(crate) async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshBody>,
) -> ApiResult<Json<Value>> {
    let pair = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(json!({
        "accessToken": pair.access_token,
        "refreshToken": pair.refresh_token,
        "expiresIn": pair.expires_in,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LogoutBody {
    #[serde(default)]
    refresh_token: String,
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LogoutBody>,
) -> ApiResult<Json<Value>> {
    let access = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthenticated("missing bearer token"))?;
    state.auth.logout(access, &body.refresh_token).await?;
    Ok(Json(json!({"ok": true})))
}

#[derive(Deserialize)]
pub(crate) struct CreateApiKeyBody {
    name: String,
    role: String,
}

pub(crate) async fn create_api_key(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateApiKeyBody>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "auth/api-keys", "write").await?;
    let created = state.auth.create_api_key(body.name, &body.role).await?;
    // The plaintext appears here exactly once.
    Ok(Json(json!({
        "id": created.record.id.to_string(),
        "key": created.plaintext,
        "prefix": created.record.prefix,
        "role": body.role,
    })))
}

pub(crate) async fn list_api_keys(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "auth/api-keys", "read").await?;
    let keys: Vec<Value> = state
        .auth
        .api_keys()
        .list()
        .await?
        .into_iter()
        .map(|k| {
            json!({
                "id": k.id.to_string(),
                "name": k.name,
                "prefix": k.prefix,
                "role": k.role.to_string(),
                "createdAt": k.created_at,
                "lastUsedAt": k.last_used_at,
            })
        })
        .collect();
    Ok(Json(json!({"keys": keys})))
}
