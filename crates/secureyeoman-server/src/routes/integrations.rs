//! Integration endpoints: CRUD plus the per-platform webhook sinks.
//!
//! Webhook sinks are unauthenticated at the token layer; the platform
//! signature is the credential. A failed signature returns 401 and records
//! `webhook_signature_invalid`.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use secureyeoman_audit::{AuditEvent, AuditLevel};
use secureyeoman_auth::Principal;
use secureyeoman_core::IntegrationId;
use secureyeoman_integrations::{IntegrationRecord, IntegrationStatus};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_permission;
use crate::state::AppState;

fn parse_integration_id(id: &str) -> Result<IntegrationId, ApiError> {
    IntegrationId::parse(id).map_err(|_| ApiError::invalid(format!("bad integration id: {id}")))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IntegrationBody {
    platform: String,
    display_name: String,
    #[serde(default)]
    config: Value,
    #[serde(default)]
    enabled: Option<bool>,
}

pub(crate) async fn create_integration(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<IntegrationBody>,
) -> ApiResult<Json<IntegrationRecord>> {
    require_permission(&state, &principal, "integrations", "write").await?;
    let mut record = IntegrationRecord::new(body.platform, body.display_name, body.config);
    if let Some(enabled) = body.enabled {
        record.enabled = enabled;
    }
    let record = state.integrations.store().upsert(record).await?;
    Ok(Json(record.redacted()))
}

pub(crate) async fn list_integrations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<IntegrationRecord>>> {
    require_permission(&state, &principal, "integrations", "read").await?;
    let records = state
        .integrations
        .store()
        .list()
        .await?
        .into_iter()
        .map(|r| r.redacted())
        .collect();
    Ok(Json(records))
}

pub(crate) async fn get_integration(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<IntegrationRecord>> {
    require_permission(&state, &principal, "integrations", "read").await?;
    let record = state
        .integrations
        .store()
        .get(parse_integration_id(&id)?)
        .await?;
    Ok(Json(record.redacted()))
}

pub(crate) async fn update_integration(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<IntegrationBody>,
) -> ApiResult<Json<IntegrationRecord>> {
    require_permission(&state, &principal, "integrations", "write").await?;
    let mut record = state
        .integrations
        .store()
        .get(parse_integration_id(&id)?)
        .await?;
    record.platform = body.platform;
    record.display_name = body.display_name;
    if !body.config.is_null() {
        record.config = body.config;
    }
    if let Some(enabled) = body.enabled {
        record.enabled = enabled;
    }
    record.updated_at = secureyeoman_core::Timestamp::now();
    let record = state.integrations.store().upsert(record).await?;
    Ok(Json(record.redacted()))
}

pub(crate) async fn delete_integration(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "integrations", "write").await?;
    state
        .integrations
        .store()
        .delete(parse_integration_id(&id)?)
        .await?;
    Ok(Json(json!({"ok": true})))
}

/// Platform webhook sink: verify the signature, parse the event, and feed
/// each resulting message through the inbound router.
pub(crate) async fn webhook_sink(
    State(state): State<AppState>,
    Path((platform, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<Json<Value>> {
    let integration_id = parse_integration_id(&id)?;
    let integration = state.integrations.store().get(integration_id).await?;
    if !integration.enabled || integration.platform != platform {
        return Err(ApiError(secureyeoman_core::YeomanError::not_found(
            "integration not available",
        )));
    }

    let adapter = state
        .integrations
        .adapters()
        .get(&platform)
        .ok_or_else(|| ApiError::invalid(format!("no adapter for platform: {platform}")))?;

    // Adapters know which header carries their platform's signature; pass
    // the most common ones through.
    let signature = headers
        .get("x-hub-signature-256")
        .or_else(|| headers.get("x-line-signature"))
        .or_else(|| headers.get("x-gitlab-token"))
        .and_then(|v| v.to_str().ok());

    if !adapter.verify_webhook(&body, signature) {
        state
            .audit
            .record(
                AuditEvent::new(
                    "webhook_signature_invalid",
                    AuditLevel::Warn,
                    "webhook signature verification failed",
                )
                .with_metadata(json!({"platform": platform, "integrationId": id})),
            )
            .await?;
        return Err(ApiError::unauthenticated("invalid webhook signature"));
    }

    let messages = adapter.handle_webhook(integration_id, &body).await?;
    let count = messages.len();
    for message in messages {
        state.integrations.handle_inbound(message).await?;
    }
    Ok(Json(json!({"ok": true, "messages": count})))
}

/// Health endpoint rollup for integrations.
pub(crate) async fn integration_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "integrations", "read").await?;
    let record = state
        .integrations
        .store()
        .get(parse_integration_id(&id)?)
        .await?;
    let healthy = match state.integrations.adapters().get(&record.platform) {
        Some(adapter) => adapter.is_healthy().await,
        None => false,
    };
    let status = if healthy {
        IntegrationStatus::Running
    } else {
        record.status
    };
    Ok(Json(json!({
        "id": record.id.to_string(),
        "status": status,
        "healthy": healthy,
        "messageCount": record.message_count,
    })))
}
