//! Brain endpoints: memories, knowledge, search, consolidation, reindex.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use secureyeoman_auth::Principal;
use secureyeoman_core::MemoryId;
use secureyeoman_memory::{MemoryRecord, MemoryType};
use secureyeoman_soul::Knowledge;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_permission;
use crate::state::AppState;

pub(crate) async fn list_memories(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "brain/memories", "read").await?;
    let memories = state.memory.list().await?;
    let count = memories.len();
    Ok(Json(json!({"memories": memories, "count": count})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateMemoryBody {
    content: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    memory_type: Option<MemoryType>,
    #[serde(default)]
    importance: Option<f64>,
}

pub(crate) async fn create_memory(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateMemoryBody>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "brain/memories", "write").await?;

    let mut record = MemoryRecord::new(
        body.content,
        body.source.unwrap_or_else(|| "api".to_string()),
    );
    if let Some(memory_type) = body.memory_type {
        record = record.with_type(memory_type);
    }
    if let Some(importance) = body.importance {
        record = record.with_importance(importance);
    }

    let (record, outcome) = state.memory.save(record).await?;
    Ok(Json(json!({"memory": record, "quickCheck": outcome})))
}

pub(crate) async fn delete_memory(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "brain/memories", "write").await?;
    let id = MemoryId::parse(&id).map_err(|_| ApiError::invalid(format!("bad memory id: {id}")))?;
    state.memory.delete(id).await?;
    Ok(Json(json!({"ok": true})))
}

pub(crate) async fn list_knowledge(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<Knowledge>>> {
    require_permission(&state, &principal, "brain/knowledge", "read").await?;
    Ok(Json(state.soul.list_knowledge().await?))
}

pub(crate) async fn stats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "brain/stats", "read").await?;
    let stats = state.memory.stats().await?;
    Ok(Json(serde_json::to_value(stats).unwrap_or_default()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchBody {
    query: String,
    #[serde(default)]
    k: Option<usize>,
    #[serde(default)]
    threshold: Option<f32>,
}

pub(crate) async fn search_similar(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<SearchBody>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "brain/memories", "read").await?;
    let hits = state
        .memory
        .search_similar(&body.query, body.k.unwrap_or(10), body.threshold)
        .await?;
    let results: Vec<Value> = hits
        .into_iter()
        .map(|(record, similarity)| json!({"memory": record, "similarity": similarity}))
        .collect();
    Ok(Json(json!({"results": results})))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ConsolidationBody {
    dry_run: bool,
}

pub(crate) async fn run_consolidation(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<ConsolidationBody>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "brain/consolidation", "write").await?;

    let dry_run = body.dry_run;
    let mut config = state.consolidation.config().await;
    if config.dry_run != dry_run {
        config.dry_run = dry_run;
        state.consolidation.set_config(config).await?;
    }

    let summary = state.consolidation.run_deep_consolidation().await?;
    Ok(Json(serde_json::to_value(summary).unwrap_or_default()))
}

pub(crate) async fn reindex(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "brain/reindex", "write").await?;
    let count = state.memory.reindex().await?;
    Ok(Json(json!({"reindexed": count})))
}
