// ABOUTME: Application error type shared by all HTTP handlers
// ABOUTME: Maps domain errors to status codes, machine-readable codes and sanitized messages

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use droneguide_ai::AIServiceError;
use droneguide_core::ValidationError;
use droneguide_storage::StorageError;
use droneguide_tasks::TaskError;
use droneguide_visualize::GenerationError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Main application error type that all handlers should return
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: u64, limit: u32 },

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Storage error")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("AI model error")]
    Model(#[from] AIServiceError),
}

/// Structured error response format for API consistency
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: ErrorDetail,
    request_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl AppError {
    /// Convert AppError to appropriate HTTP status code and error code
    fn to_status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED")
            }
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            AppError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            AppError::Storage(StorageError::NotFound) => {
                (StatusCode::NOT_FOUND, "PROJECT_NOT_FOUND")
            }
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            AppError::Task(task_error) => match task_error {
                TaskError::NotFound(_) => (StatusCode::NOT_FOUND, "TASK_NOT_FOUND"),
                TaskError::NotReady(_) => (StatusCode::CONFLICT, "TASK_NOT_READY"),
                TaskError::Failed(_) => (StatusCode::UNPROCESSABLE_ENTITY, "GENERATION_FAILED"),
                TaskError::Finished { .. } | TaskError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "TASK_FINISHED")
                }
            },
            AppError::Model(AIServiceError::NoApiKey) => {
                (StatusCode::SERVICE_UNAVAILABLE, "MODEL_NOT_CONFIGURED")
            }
            AppError::Model(_) => (StatusCode::BAD_GATEWAY, "MODEL_ERROR"),
        }
    }

    /// Get user-friendly error message (sanitized for external consumption)
    fn to_user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::RateLimitExceeded { .. } => {
                "Too many requests. Please try again later".to_string()
            }
            AppError::Upstream(msg) => msg.clone(),
            AppError::Configuration(_) => "Server configuration error".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            AppError::Storage(StorageError::NotFound) => "Project not found".to_string(),
            AppError::Storage(_) => "Data storage error".to_string(),
            AppError::Task(task_error) => match task_error {
                TaskError::NotFound(_) => "Generation task not found".to_string(),
                TaskError::NotReady(status) => {
                    format!("Image is not ready yet (status: {})", status)
                }
                TaskError::Failed(reason) => format!("Image generation failed: {}", reason),
                TaskError::Finished { status, .. } => {
                    format!("Generation task already {}", status)
                }
                TaskError::InvalidTransition { .. } => {
                    "Generation task cannot be changed".to_string()
                }
            },
            AppError::Model(AIServiceError::NoApiKey) => {
                "The AI model is not configured on this server".to_string()
            }
            AppError::Model(_) => "The AI model request failed".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let (status_code, error_code) = self.to_status_and_code();
        let user_message = self.to_user_message();

        match &self {
            AppError::Internal(err) => {
                error!(
                    request_id = %request_id,
                    error = %err,
                    "Internal server error occurred"
                );
            }
            AppError::Configuration(msg) => {
                error!(
                    request_id = %request_id,
                    config_error = %msg,
                    "Configuration error"
                );
            }
            AppError::Storage(storage_err) if !matches!(storage_err, StorageError::NotFound) => {
                error!(
                    request_id = %request_id,
                    storage_error = %storage_err,
                    "Storage system error"
                );
            }
            AppError::Model(model_err) => {
                error!(
                    request_id = %request_id,
                    model_error = %model_err,
                    "AI model call failed"
                );
            }
            AppError::Upstream(msg) => {
                error!(
                    request_id = %request_id,
                    upstream_error = %msg,
                    "Upstream service call failed"
                );
            }
            AppError::RateLimitExceeded { retry_after, limit } => {
                warn!(
                    request_id = %request_id,
                    retry_after = %retry_after,
                    limit = %limit,
                    "Rate limit exceeded"
                );
            }
            _ => {
                info!(
                    request_id = %request_id,
                    error_code = %error_code,
                    error = %self,
                    "API error response"
                );
            }
        }

        let retry_after = match &self {
            AppError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        };

        let error_response = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: error_code,
                message: user_message,
                retry_after,
            },
            request_id,
        };

        let mut response = (status_code, Json(error_response)).into_response();

        if let AppError::RateLimitExceeded { retry_after, limit } = &self {
            let headers = response.headers_mut();
            headers.insert("Retry-After", HeaderValue::from(*retry_after));
            headers.insert("X-RateLimit-Limit", HeaderValue::from(*limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(*retry_after));
        }

        response
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Validation(e) => e.into(),
            GenerationError::Submit(e) => {
                Self::Upstream(format!("Image generation service unavailable: {}", e))
            }
            GenerationError::Task(e) => e.into(),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper functions for common error scenarios
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn rate_limited(retry_after: u64, limit: u32) -> Self {
        Self::RateLimitExceeded { retry_after, limit }
    }
}
