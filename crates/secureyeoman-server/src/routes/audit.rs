//! Audit endpoints: query and verification.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use secureyeoman_audit::{AuditLevel, AuditQuery};
use secureyeoman_auth::Principal;
use secureyeoman_core::Timestamp;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_permission;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuditQueryParams {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    from: Option<i64>,
    #[serde(default)]
    to: Option<i64>,
    #[serde(default)]
    limit: Option<usize>,
}

fn parse_level(level: &str) -> Result<AuditLevel, ApiError> {
    serde_json::from_value(Value::String(level.to_string()))
        .map_err(|_| ApiError::invalid(format!("unknown level: {level}")))
}

pub(crate) async fn query(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "audit/entries", "read").await?;

    let filter = AuditQuery {
        level: params.level.as_deref().map(parse_level).transpose()?,
        event: params.event,
        user_id: params.user_id,
        from: params.from.map(Timestamp::from_millis),
        to: params.to.map(Timestamp::from_millis),
        limit: params.limit,
    };
    let entries = state.audit.query(&filter).await?;
    let count = entries.len();
    Ok(Json(json!({"entries": entries, "count": count})))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct VerifyBody {
    from_sequence: Option<u64>,
    to_sequence: Option<u64>,
}

pub(crate) async fn verify(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<VerifyBody>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "audit/chain", "verify").await?;

    let range = match (body.from_sequence, body.to_sequence) {
        (Some(from), Some(to)) => Some((from, to)),
        _ => None,
    };
    let report = state.audit.verify(range).await?;
    Ok(Json(json!({
        "valid": report.valid,
        "entriesChecked": report.entries_checked,
        "error": report.error,
        "firstBadSequence": report.first_bad_sequence,
    })))
}
