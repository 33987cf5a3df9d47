//! Model endpoints: info, switching, routing, cost recommendations.

use axum::extract::State;
use axum::{Extension, Json};
use secureyeoman_ai::CostOptimizer;
use secureyeoman_auth::Principal;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_permission;
use crate::state::AppState;

pub(crate) async fn info(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "model/info", "read").await?;

    let Some(gateway) = &state.gateway else {
        return Ok(Json(json!({
            "configured": false,
            "version": state.config.version,
        })));
    };

    let (provider, model) = gateway.current_default();
    let limit = gateway.check_limit();
    let summary = gateway.usage().summary();
    Ok(Json(json!({
        "configured": true,
        "version": state.config.version,
        "provider": provider,
        "model": model,
        "providers": gateway.provider_names(),
        "usage": summary,
        "limit": limit,
    })))
}

#[derive(Deserialize)]
pub(crate) struct SwitchBody {
    provider: String,
    #[serde(default)]
    model: Option<String>,
}

pub(crate) async fn switch(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<SwitchBody>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "model/default", "write").await?;
    let gateway = state
        .gateway
        .as_ref()
        .ok_or_else(|| ApiError::invalid("no AI provider configured"))?;
    gateway.switch(&body.provider, body.model.clone())?;
    Ok(Json(json!({"provider": body.provider, "model": body.model})))
}

pub(crate) async fn get_default(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "model/default", "read").await?;
    match &state.gateway {
        Some(gateway) => {
            let (provider, model) = gateway.current_default();
            Ok(Json(json!({"provider": provider, "model": model})))
        },
        None => Ok(Json(json!({"provider": null, "model": null}))),
    }
}

pub(crate) async fn clear_default(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "model/default", "write").await?;
    if let Some(gateway) = &state.gateway {
        gateway.clear_default_model();
    }
    Ok(Json(json!({"ok": true})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RouteBody {
    prompt: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    token_budget: Option<u64>,
    #[serde(default)]
    allowed_models: Vec<String>,
}

pub(crate) async fn route(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<RouteBody>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "model/route", "read").await?;
    let decision = state.model_router.route(
        &body.prompt,
        body.context.as_deref(),
        body.token_budget.unwrap_or(4_096),
        &body.allowed_models,
    );
    Ok(Json(serde_json::to_value(decision).unwrap_or_default()))
}

pub(crate) async fn cost_recommendations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "model/cost", "read").await?;
    let recommendations = state
        .gateway
        .as_ref()
        .map(|gateway| CostOptimizer::analyze(&gateway.usage().summary()))
        .unwrap_or_default();
    Ok(Json(json!({"recommendations": recommendations})))
}
