//! Soul endpoints: personalities, skills, prompt preview, onboarding.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use secureyeoman_auth::Principal;
use secureyeoman_core::{IntegrationId, PersonalityId, SkillId};
use secureyeoman_hooks::{HookContext, HookPoint};
use secureyeoman_soul::{Personality, Skill};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::require_permission;
use crate::state::AppState;

fn parse_personality_id(id: &str) -> Result<PersonalityId, ApiError> {
    PersonalityId::parse(id).map_err(|_| ApiError::invalid(format!("bad personality id: {id}")))
}

fn parse_skill_id(id: &str) -> Result<SkillId, ApiError> {
    SkillId::parse(id).map_err(|_| ApiError::invalid(format!("bad skill id: {id}")))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersonalityBody {
    name: String,
    #[serde(default)]
    system_prompt: String,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    selected_integrations: Vec<String>,
}

fn parse_integrations(ids: &[String]) -> Result<Vec<IntegrationId>, ApiError> {
    ids.iter()
        .map(|id| {
            IntegrationId::parse(id)
                .map_err(|_| ApiError::invalid(format!("bad integration id: {id}")))
        })
        .collect()
}

pub(crate) async fn create_personality(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<PersonalityBody>,
) -> ApiResult<Json<Personality>> {
    require_permission(&state, &principal, "soul/personalities", "write").await?;
    let mut personality = Personality::new(body.name, body.system_prompt);
    personality.voice = body.voice;
    personality.selected_integrations = parse_integrations(&body.selected_integrations)?;
    let created = state.soul.create_personality(personality).await?;
    Ok(Json(created))
}

pub(crate) async fn list_personalities(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<Personality>>> {
    require_permission(&state, &principal, "soul/personalities", "read").await?;
    Ok(Json(state.soul.list_personalities().await?))
}

pub(crate) async fn get_personality(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Personality>> {
    require_permission(&state, &principal, "soul/personalities", "read").await?;
    Ok(Json(state.soul.personality(parse_personality_id(&id)?).await?))
}

pub(crate) async fn update_personality(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<PersonalityBody>,
) -> ApiResult<Json<Personality>> {
    require_permission(&state, &principal, "soul/personalities", "write").await?;
    let selected = parse_integrations(&body.selected_integrations)?;
    let updated = state
        .soul
        .update_personality(parse_personality_id(&id)?, move |p| {
            p.name = body.name;
            p.system_prompt = body.system_prompt;
            p.voice = body.voice;
            p.selected_integrations = selected;
        })
        .await?;
    Ok(Json(updated))
}

pub(crate) async fn delete_personality(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "soul/personalities", "write").await?;
    state
        .soul
        .delete_personality(parse_personality_id(&id)?)
        .await?;
    Ok(Json(json!({"ok": true})))
}

pub(crate) async fn activate_personality(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Personality>> {
    require_permission(&state, &principal, "soul/personalities", "write").await?;
    let activated = state
        .soul
        .activate_personality(parse_personality_id(&id)?)
        .await?;
    Ok(Json(activated))
}

pub(crate) async fn active_personality(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "soul/personality", "read").await?;
    let active = state.soul.active_personality().await?;
    Ok(Json(json!({"personality": active})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SkillBody {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    personality_id: Option<String>,
}

pub(crate) async fn create_skill(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<SkillBody>,
) -> ApiResult<Json<Skill>> {
    require_permission(&state, &principal, "soul/skills", "write").await?;
    let mut skill = Skill::new(body.name, body.description);
    if let Some(personality_id) = body.personality_id {
        skill = skill.for_personality(parse_personality_id(&personality_id)?);
    }
    Ok(Json(state.soul.create_skill(skill).await?))
}

pub(crate) async fn list_skills(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<Skill>>> {
    require_permission(&state, &principal, "soul/skills", "read").await?;
    Ok(Json(state.soul.list_skills().await?))
}

pub(crate) async fn skill_action(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, action)): Path<(String, String)>,
) -> ApiResult<Json<Skill>> {
    require_permission(&state, &principal, "soul/skills", "write").await?;
    let id = parse_skill_id(&id)?;
    let skill = match action.as_str() {
        "enable" => state.soul.enable_skill(id).await?,
        "disable" => state.soul.disable_skill(id).await?,
        "approve" => state.soul.approve_skill(id).await?,
        "reject" => state.soul.reject_skill(id).await?,
        other => return Err(ApiError::invalid(format!("unknown skill action: {other}"))),
    };
    Ok(Json(skill))
}

pub(crate) async fn delete_skill(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "soul/skills", "write").await?;
    let deleted = state.soul.delete_skill(parse_skill_id(&id)?).await?;

    // Explicit deletion notification for dependents (marketplace sync,
    // prompt caches).
    state
        .hooks
        .emit(HookContext::new(
            HookPoint::SkillDeleted,
            "skill.deleted",
            json!({"skillId": deleted.id.to_string(), "name": deleted.name}),
        ))
        .await;

    Ok(Json(json!({"ok": true, "deleted": deleted})))
}

pub(crate) async fn prompt_preview(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "soul/prompt", "read").await?;
    Ok(Json(json!({"prompt": state.soul.prompt_preview().await?})))
}

pub(crate) async fn onboarding_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "soul/onboarding", "read").await?;
    let status = state.soul.onboarding_status().await?;
    Ok(Json(serde_json::to_value(status).unwrap_or_default()))
}

pub(crate) async fn onboarding_complete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Value>> {
    require_permission(&state, &principal, "soul/onboarding", "write").await?;
    let status = state.soul.complete_onboarding().await?;
    Ok(Json(serde_json::to_value(status).unwrap_or_default()))
}
