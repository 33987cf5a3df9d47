//! Extension endpoints: extension CRUD, hook inspection and test firing,
//! outbound webhook CRUD, discovery.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use secureyeoman_auth::Principal;
use secureyeoman_core::WebhookId;
use secureyeoman_hooks::{
    ExtensionRecord, HookContext, HookPoint, WebhookRecord,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_permission;
use crate::state::AppState;

pub(crate) async fn list_extensions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<ExtensionRecord>>> {
    require_permission(&state, &principal, "extensions", "read").await?;
    Ok(Json(state.extensions.list().await?))
}

pub(crate) async fn create_extension(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(record): Json<ExtensionRecord>,
) -> ApiResult<Json<ExtensionRecord>> {
    require_permission(&state, &principal, "extensions", "write").await?;
    let record = state.extensions.upsert(record).await?;

    // Newly persisted hooks get placeholder handlers immediately.
    for hook in &record.hooks {
        state
            .hooks
            .register_hook(
                hook.point,
                std::sync::Arc::new(secureyeoman_hooks::FnHookHandler(
                    |_ctx: &HookContext, _cur: &Value| {
                        Ok(secureyeoman_hooks::HandlerVerdict::pass())
                    },
                )),
                hook.semantics,
                hook.priority,
                Some(record.extension_id.clone()),
            )
            .await;
    }
    Ok(Json(record))
}

pub(crate) async fn get_extension(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExtensionRecord>> {
    require_permission(&state, &principal, "extensions", "read").await?;
    Ok(Json(state.extensions.get(&id).await?))
}

pub(crate) async fn delete_extension(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "extensions", "write").await?;
    state.extensions.delete(&id, &state.hooks).await?;
    Ok(Json(json!({"ok": true})))
}

pub(crate) async fn list_hooks(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "extensions/hooks", "read").await?;
    let mut points = Vec::new();
    for point in HookPoint::all() {
        let registrations = state.hooks.registrations(*point).await;
        points.push(json!({
            "point": point.as_str(),
            "handlers": registrations.len(),
        }));
    }
    Ok(Json(json!({"points": points})))
}

#[derive(Deserialize)]
pub(crate) struct HookTestBody {
    point: String,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Value,
}

pub(crate) async fn test_hook(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<HookTestBody>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "extensions/hooks", "write").await?;
    let point: HookPoint = body
        .point
        .parse()
        .map_err(|e: String| ApiError::invalid(e))?;
    let event = body.event.unwrap_or_else(|| point.as_str().to_string());
    let result = state
        .hooks
        .emit(HookContext::new(point, event, body.data))
        .await;
    Ok(Json(serde_json::to_value(result).unwrap_or_default()))
}

pub(crate) async fn discover(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "extensions", "read").await?;
    let points: Vec<&str> = HookPoint::all().iter().map(HookPoint::as_str).collect();
    Ok(Json(json!({"hookPoints": points})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebhookBody {
    url: String,
    hook_points: Vec<String>,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

pub(crate) async fn create_webhook(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<WebhookBody>,
) -> ApiResult<Json<WebhookRecord>> {
    require_permission(&state, &principal, "extensions/webhooks", "write").await?;
    let points: Result<Vec<HookPoint>, _> =
        body.hook_points.iter().map(|p| p.parse()).collect();
    let mut record = WebhookRecord::new(body.url, points.map_err(|e: String| ApiError::invalid(e))?);
    record.secret = body.secret;
    record.enabled = body.enabled;
    // Access the store through the engine's dispatcher.
    let record = state.webhook_store().upsert(record).await?;
    Ok(Json(record))
}

pub(crate) async fn list_webhooks(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<WebhookRecord>>> {
    require_permission(&state, &principal, "extensions/webhooks", "read").await?;
    Ok(Json(state.webhook_store().list().await?))
}

pub(crate) async fn delete_webhook(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "extensions/webhooks", "write").await?;
    let id =
        WebhookId::parse(&id).map_err(|_| ApiError::invalid(format!("bad webhook id: {id}")))?;
    state.webhook_store().delete(id).await?;
    Ok(Json(json!({"ok": true})))
}
