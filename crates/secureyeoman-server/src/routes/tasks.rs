//! Task endpoints: submission, listing, cancellation.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use secureyeoman_auth::Principal;
use secureyeoman_core::TaskId;
use secureyeoman_tasks::{ExecutionContext, TaskDefinition, TaskRecord};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_permission;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitBody {
    #[serde(default = "default_task_type")]
    task_type: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    input: Value,
    /// When set, run inline and return the finished record.
    #[serde(default)]
    wait: bool,
}

fn default_task_type() -> String {
    "QUERY".to_string()
}

pub(crate) async fn submit(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<SubmitBody>,
) -> ApiResult<Json<TaskRecord>> {
    require_permission(&state, &principal, "tasks/submit", "execute").await?;
    let definition = TaskDefinition::new(body.task_type, body.name, body.input)
        .with_description(body.description);
    let ctx = ExecutionContext {
        user_id: principal.id.clone(),
        role: "operator".into(),
        correlation_id: None,
    };
    let record = if body.wait {
        state.executor.submit_and_wait(definition, ctx).await?
    } else {
        state.executor.submit(definition, ctx).await?
    };
    Ok(Json(record))
}

pub(crate) async fn list_tasks(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<TaskRecord>>> {
    require_permission(&state, &principal, "tasks", "read").await?;
    Ok(Json(state.executor.list().await?))
}

pub(crate) async fn get_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskRecord>> {
    require_permission(&state, &principal, "tasks", "read").await?;
    let id = TaskId::parse(&id).map_err(|_| ApiError::invalid(format!("bad task id: {id}")))?;
    Ok(Json(state.executor.get(id).await?))
}

pub(crate) async fn cancel_task(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "tasks", "write").await?;
    let id = TaskId::parse(&id).map_err(|_| ApiError::invalid(format!("bad task id: {id}")))?;
    let record = state.executor.cancel(id).await?;
    Ok(Json(json!({"ok": true, "task": record})))
}
