// ABOUTME: HTTP request handlers for frame analysis, voice queries and step instructions
// ABOUTME: Combines cached model answers with project context and persists identified parts

use axum::{extract::State, Json};
use chrono::Utc;
use droneguide_cache::{CacheKey, ProjectScope};
use droneguide_core::{
    require_text, validate_image, validate_step_number, Component, ComponentInput,
    ProjectContext, Step,
};
use droneguide_storage::StorageError;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{ApiResult, AppError};
use crate::AppState;

const VALIDATE_CACHE_KIND: &str = "validate";

/// Both ids of a request, when the caller supplied them
fn project_ids<'a>(
    user_id: &'a Option<String>,
    project_id: &'a Option<String>,
) -> Option<(&'a str, &'a str)> {
    let user_id = user_id.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
    let project_id = project_id.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
    Some((user_id, project_id))
}

/// Load the project context for prompting. Failures only cost the context.
async fn load_context(state: &AppState, ids: Option<(&str, &str)>) -> Option<ProjectContext> {
    let (user_id, project_id) = ids?;
    match state.storage.get_project_context(user_id, project_id).await {
        Ok(context) => {
            if let Err(e) = state.storage.touch(user_id, project_id).await {
                warn!(user_id, project_id, error = %e, "Failed to record interaction");
            }
            Some(context)
        }
        Err(StorageError::NotFound) => {
            debug!(user_id, project_id, "No stored project, analysing without context");
            None
        }
        Err(e) => {
            warn!(user_id, project_id, error = %e, "Failed to load project context");
            None
        }
    }
}

/// Merge identified components into the project. Failures are logged, never returned.
async fn save_components(state: &AppState, ids: Option<(&str, &str)>, components: &[Component]) {
    let Some((user_id, project_id)) = ids else {
        return;
    };
    if components.is_empty() {
        return;
    }

    let incoming = components.iter().cloned().map(ComponentInput::from).collect();
    match state
        .storage
        .reconcile_components(user_id, project_id, incoming)
        .await
    {
        Ok(update) if update.added > 0 => {
            info!(user_id, project_id, added = update.added, "Saved identified components");
        }
        Ok(_) => debug!(user_id, project_id, "No new components to save"),
        Err(e) => warn!(user_id, project_id, error = %e, "Failed to save identified components"),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub image: Option<String>,
    pub current_step: Option<u32>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
}

/// Analyse the current frame of the build
pub async fn validate_assembly(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<Json<Value>> {
    let image = validate_image(request.image.as_deref())?;
    let step = validate_step_number(request.current_step.unwrap_or(1))?;
    let ids = project_ids(&request.user_id, &request.project_id);
    let scope = ProjectScope::new(request.user_id.as_deref(), request.project_id.as_deref());
    let key = CacheKey::for_image(scope.clone(), VALIDATE_CACHE_KIND, &image);

    if let Some(mut cached) = state.cache.lookup(&key) {
        debug!(scope = %scope, "Serving validation from cache");
        cached["meta"]["cacheSource"] = json!("cache");
        return Ok(Json(cached));
    }

    let evicted = state.cache.invalidate(&scope);
    if evicted > 0 {
        debug!(scope = %scope, evicted, "Invalidated cached responses");
    }

    let context = load_context(&state, ids).await;
    let result = state
        .assistant
        .validate_assembly(&image, step, context.as_ref())
        .await?;
    let analysis = result.value;

    save_components(&state, ids, &analysis.identified_components).await;

    if analysis.can_proceed {
        if let Some((user_id, project_id)) = ids {
            let details = if analysis.feedback.trim().is_empty() {
                "Step completed successfully".to_string()
            } else {
                analysis.feedback.clone()
            };
            if let Err(e) = state
                .storage
                .add_completed_step(user_id, project_id, Step::completed(step, details))
                .await
            {
                warn!(user_id, project_id, step, error = %e, "Failed to record completed step");
            }
        }
    }

    let body = json!({
        "success": true,
        "analysis": analysis,
        "hasContext": context.is_some(),
        "meta": {
            "timestamp": Utc::now(),
            "cacheSource": "fresh",
            "parsed": result.parsed,
        }
    });
    state.cache.store(key, body.clone());

    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceQueryRequest {
    pub image: Option<String>,
    pub query: Option<String>,
    pub current_step: Option<u32>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
}

/// Answer a spoken question about the current frame
pub async fn voice_query(
    State(state): State<AppState>,
    Json(request): Json<VoiceQueryRequest>,
) -> ApiResult<Json<Value>> {
    let image = validate_image(request.image.as_deref())?;
    let query = require_text("query", request.query.as_deref())?;
    let step = validate_step_number(request.current_step.unwrap_or(1))?;
    let ids = project_ids(&request.user_id, &request.project_id);

    state.cache.invalidate(&ProjectScope::new(
        request.user_id.as_deref(),
        request.project_id.as_deref(),
    ));

    let context = load_context(&state, ids).await;
    let result = state
        .assistant
        .answer_query(&query, &image, step, context.as_ref())
        .await?;

    save_components(&state, ids, &result.value.identified_components).await;

    Ok(Json(json!({
        "success": true,
        "analysis": result.value,
        "hasContext": context.is_some(),
        "meta": {
            "timestamp": Utc::now(),
            "step": step,
            "query": query,
            "parsed": result.parsed,
        }
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionsRequest {
    pub step: Option<u32>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
}

pub async fn step_instructions(
    State(state): State<AppState>,
    Json(request): Json<InstructionsRequest>,
) -> ApiResult<Json<Value>> {
    let step = request
        .step
        .ok_or_else(|| AppError::validation("step is required"))?;
    let step = validate_step_number(step)?;
    let ids = project_ids(&request.user_id, &request.project_id);

    let context = load_context(&state, ids).await;
    let result = state
        .assistant
        .step_instructions(step, context.as_ref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "instructions": result.value,
        "hasContext": context.is_some(),
        "meta": {
            "timestamp": Utc::now(),
            "step": step,
            "parsed": result.parsed,
        }
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPartsRequest {
    pub image: Option<String>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
}

pub async fn identify_parts(
    State(state): State<AppState>,
    Json(request): Json<IdentifyPartsRequest>,
) -> ApiResult<Json<Value>> {
    let image = validate_image(request.image.as_deref())?;
    let ids = project_ids(&request.user_id, &request.project_id);

    state.cache.invalidate(&ProjectScope::new(
        request.user_id.as_deref(),
        request.project_id.as_deref(),
    ));

    let context = load_context(&state, ids).await;
    let result = state
        .assistant
        .identify_parts(&image, context.as_ref())
        .await?;

    save_components(&state, ids, &result.value.identified_parts).await;

    Ok(Json(json!({
        "success": true,
        "analysis": result.value,
        "hasContext": context.is_some(),
        "meta": {
            "timestamp": Utc::now(),
            "parsed": result.parsed,
        }
    })))
}

/// Round-trip a trivial prompt through the model
pub async fn test_connection(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let reply = state.assistant.test_connection().await?;
    info!(model = %state.assistant.model_name(), "Model connection test succeeded");

    Ok(Json(json!({
        "success": true,
        "response": "Model API connection successful",
        "model": state.assistant.model_name(),
        "testResponse": reply,
    })))
}
