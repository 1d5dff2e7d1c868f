// ABOUTME: HTTP API layer for DroneGuide providing REST endpoints and routing
// ABOUTME: Integration layer wiring storage, cache, assistant and generation orchestrator

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use droneguide_ai::AssemblyAssistant;
use droneguide_cache::ResponseCache;
use droneguide_storage::ProjectStorage;
use droneguide_visualize::GenerationOrchestrator;

pub mod analysis_handlers;
pub mod error;
pub mod health;
pub mod project_handlers;
pub mod rate_limit;
pub mod visualize_handlers;

pub use error::{ApiResult, AppError};
pub use rate_limit::{RateLimitConfig, RateLimitLayer};

/// Shared handles every handler works against
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn ProjectStorage>,
    pub assistant: AssemblyAssistant,
    pub cache: ResponseCache,
    pub orchestrator: GenerationOrchestrator,
}

/// Creates the analysis router (nested under /api/analysis), rate limited per client
pub fn create_analysis_router(rate_limit: RateLimitLayer) -> Router<AppState> {
    Router::new()
        .route("/validate", post(analysis_handlers::validate_assembly))
        .route("/voice-query", post(analysis_handlers::voice_query))
        .route("/instructions", post(analysis_handlers::step_instructions))
        .route("/identify-parts", post(analysis_handlers::identify_parts))
        .route("/test", get(analysis_handlers::test_connection))
        .layer(middleware::from_fn_with_state(
            rate_limit,
            rate_limit::rate_limit_middleware,
        ))
}

/// Creates the visualization router (nested under /api/visualize)
pub fn create_visualize_router() -> Router<AppState> {
    Router::new()
        .route("/", post(visualize_handlers::start_visualization))
        .route("/progress/{task_id}", get(visualize_handlers::get_progress))
        .route("/result/{task_id}", get(visualize_handlers::get_result))
        .route("/{task_id}", delete(visualize_handlers::cancel_visualization))
}

/// Creates the project router (nested under /api/project)
pub fn create_project_router() -> Router<AppState> {
    Router::new()
        .route("/", post(project_handlers::get_or_create_project))
        .route("/initialize", post(project_handlers::initialize_project))
        .route("/components", post(project_handlers::update_components))
        .route("/step", post(project_handlers::add_completed_step))
        .route("/drone-type", post(project_handlers::update_drone_type))
        .route("/{user_id}", get(project_handlers::list_projects))
        .route(
            "/{user_id}/{project_id}/context",
            get(project_handlers::get_project_context),
        )
}

/// Full `/api` surface with state applied
pub fn create_api_router(state: AppState, rate_limit: RateLimitLayer) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .nest("/api/analysis", create_analysis_router(rate_limit))
        .nest("/api/visualize", create_visualize_router())
        .nest("/api/project", create_project_router())
        .with_state(state)
}
