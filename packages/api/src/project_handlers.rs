// ABOUTME: HTTP request handlers for assembly project state
// ABOUTME: Project lookup and onboarding, component reconciliation, steps and drone type

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use droneguide_core::{
    generate_project_id, require_text, validate_step_number, ComponentInput, Step,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{ApiResult, AppError};
use crate::AppState;

const FALLBACK_WELCOME: &str = "Welcome to DroneGuide! Point your camera at your parts and \
     I'll help you identify them and walk you through the assembly step by step.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
}

/// Fetch a project, creating it with defaults on first reference
pub async fn get_or_create_project(
    State(state): State<AppState>,
    Json(request): Json<ProjectRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = require_text("userId", request.user_id.as_deref())?;
    let project_id = require_text("projectId", request.project_id.as_deref())?;
    let project_name = request
        .project_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let project = state
        .storage
        .get_or_create_project(&user_id, &project_id, project_name)
        .await?;

    Ok(Json(json!({ "success": true, "project": project })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub user_id: Option<String>,
    pub drone_type: Option<String>,
}

/// Onboard a user: new project, optional drone type, and a welcome message
pub async fn initialize_project(
    State(state): State<AppState>,
    Json(request): Json<InitializeRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = require_text("userId", request.user_id.as_deref())?;
    let drone_type = request
        .drone_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let project_id = generate_project_id();
    let project_name = match drone_type {
        Some(drone_type) => format!("{} Drone Assembly", drone_type),
        None => "Drone Assembly Project".to_string(),
    };

    let mut project = state
        .storage
        .get_or_create_project(&user_id, &project_id, Some(&project_name))
        .await?;
    if let Some(drone_type) = drone_type {
        project = state
            .storage
            .update_drone_type(&user_id, &project_id, drone_type)
            .await?;
    }

    info!(user_id = %user_id, project_id = %project_id, "Initialized project");

    let welcome_message = match state.assistant.welcome_message(drone_type).await {
        Ok(message) if !message.is_empty() => message,
        Ok(_) => FALLBACK_WELCOME.to_string(),
        Err(e) => {
            warn!(error = %e, "Welcome message generation failed, using default");
            FALLBACK_WELCOME.to_string()
        }
    };

    Ok(Json(json!({
        "success": true,
        "project": project,
        "welcomeMessage": welcome_message,
        "meta": { "timestamp": Utc::now() }
    })))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let projects = state.storage.list_projects(&user_id).await?;
    Ok(Json(json!({ "success": true, "projects": projects })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentsRequest {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    #[serde(default)]
    pub components: Vec<Value>,
}

/// Merge components into a project; the write is skipped when nothing is new
pub async fn update_components(
    State(state): State<AppState>,
    Json(request): Json<ComponentsRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = require_text("userId", request.user_id.as_deref())?;
    let project_id = require_text("projectId", request.project_id.as_deref())?;
    let incoming: Vec<ComponentInput> = request
        .components
        .iter()
        .filter_map(ComponentInput::from_value)
        .collect();

    let update = state
        .storage
        .reconcile_components(&user_id, &project_id, incoming)
        .await?;

    Ok(Json(json!({
        "success": true,
        "project": update.project,
        "added": update.added,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInput {
    pub step_number: Option<u32>,
    pub title: Option<String>,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub step: Option<StepInput>,
}

pub async fn add_completed_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = require_text("userId", request.user_id.as_deref())?;
    let project_id = require_text("projectId", request.project_id.as_deref())?;
    let input = request
        .step
        .ok_or_else(|| AppError::validation("step is required"))?;
    let step_number = input
        .step_number
        .ok_or_else(|| AppError::validation("step.stepNumber is required"))?;
    let step_number = validate_step_number(step_number)?;

    let step = match input.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => Step::new(step_number, title, input.details),
        _ => Step::completed(step_number, input.details),
    };

    let project = state
        .storage
        .add_completed_step(&user_id, &project_id, step)
        .await?;

    Ok(Json(json!({ "success": true, "project": project })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneTypeRequest {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub drone_type: Option<String>,
}

pub async fn update_drone_type(
    State(state): State<AppState>,
    Json(request): Json<DroneTypeRequest>,
) -> ApiResult<Json<Value>> {
    let user_id = require_text("userId", request.user_id.as_deref())?;
    let project_id = require_text("projectId", request.project_id.as_deref())?;
    let drone_type = require_text("droneType", request.drone_type.as_deref())?;

    let project = state
        .storage
        .update_drone_type(&user_id, &project_id, &drone_type)
        .await?;

    Ok(Json(json!({ "success": true, "project": project })))
}

pub async fn get_project_context(
    State(state): State<AppState>,
    Path((user_id, project_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let context = state
        .storage
        .get_project_context(&user_id, &project_id)
        .await?;
    Ok(Json(json!({ "success": true, "context": context })))
}
