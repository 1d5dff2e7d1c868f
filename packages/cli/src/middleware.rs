// ABOUTME: Panic recovery for the HTTP server
// ABOUTME: Converts handler panics into the standard JSON error envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use droneguide_core::generate_request_id;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

type PanicHandler = fn(Box<dyn std::any::Any + Send + 'static>) -> Response;

/// Create a panic handler that returns consistent error responses
pub fn create_panic_handler() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(handle_panic as PanicHandler)
}

/// Log the panic and answer with a sanitized 500
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let request_id = generate_request_id();

    let panic_message = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic occurred"
    };

    error!(
        request_id = %request_id,
        panic_message = %panic_message,
        "Server panic occurred"
    );

    let body = json!({
        "success": false,
        "error": {
            "code": "INTERNAL_ERROR",
            "message": "An internal server error occurred",
        },
        "requestId": request_id,
    });

    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
