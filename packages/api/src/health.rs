// ABOUTME: Liveness endpoint
// ABOUTME: Reports service name, version and current generation load

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "droneguide-api",
        "activeGenerations": state.orchestrator.active_count(),
    }))
}
