//! Role management endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use secureyeoman_auth::{Permission, Principal, Role};
use secureyeoman_core::RoleId;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_permission;
use crate::state::AppState;

pub(crate) async fn list_roles(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<Role>>> {
    require_permission(&state, &principal, "auth/roles", "read").await?;
    Ok(Json(state.auth.rbac().list()?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRoleBody {
    name: String,
    #[serde(default)]
    permissions: Vec<Permission>,
    #[serde(default)]
    inherit_from: Vec<String>,
}

pub(crate) async fn create_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateRoleBody>,
) -> ApiResult<Json<Role>> {
    require_permission(&state, &principal, "auth/roles", "write").await?;
    let inherit_from: Result<Vec<RoleId>, ApiError> = body
        .inherit_from
        .iter()
        .map(|id| {
            RoleId::parse(id).map_err(|_| ApiError::invalid(format!("bad role id: {id}")))
        })
        .collect();
    let role = state
        .auth
        .rbac()
        .create_role(body.name, body.permissions, inherit_from?)?;
    Ok(Json(role))
}

pub(crate) async fn delete_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "auth/roles", "write").await?;
    let id = RoleId::parse(&id).map_err(|_| ApiError::invalid(format!("bad role id: {id}")))?;
    state.auth.rbac().delete_role(id)?;
    Ok(Json(json!({"ok": true})))
}
