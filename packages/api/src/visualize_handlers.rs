// ABOUTME: HTTP request handlers for asynchronous image generation
// ABOUTME: Start, poll, download and cancel generation tasks

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizeRequest {
    pub prompt: Option<String>,
    pub user_id: Option<String>,
    pub project_id: Option<String>,
}

/// Accept a generation request; returns once the image service has acknowledged it
pub async fn start_visualization(
    State(state): State<AppState>,
    Json(request): Json<VisualizeRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let task = state
        .orchestrator
        .start_generation(
            request.prompt.as_deref().unwrap_or_default(),
            request.user_id.as_deref(),
            request.project_id.as_deref(),
        )
        .await?;

    info!(task_id = %task.task_id, "Visualization accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "taskId": task.task_id,
            "status": task.status,
            "message": task.message,
        })),
    ))
}

pub async fn get_progress(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task = state.orchestrator.store().get(&task_id)?;

    let mut body = json!({
        "success": true,
        "taskId": task.task_id,
        "status": task.status,
        "progress": task.progress,
        "message": task.message,
        "updatedAt": task.updated_at,
    });
    if let Some(error) = task.error {
        body["error"] = json!(error);
    }
    Ok(Json(body))
}

/// Download the generated image. 409 while running, 422 once failed.
pub async fn get_result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Response> {
    let image = state.orchestrator.store().fetch_result(&task_id)?;

    info!(task_id = %task_id, size = image.len(), "Serving generated image");

    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("image/jpeg"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        image.data.to_vec(),
    )
        .into_response())
}

pub async fn cancel_visualization(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let task = state.orchestrator.cancel(&task_id)?;
    Ok(Json(json!({
        "success": true,
        "task": task,
    })))
}
