// ABOUTME: Abstraction over the downstream image generation service
// ABOUTME: Submit, progress and fetch operations plus their error classification

use async_trait::async_trait;
use droneguide_tasks::GeneratedImage;
use serde::Serialize;
use thiserror::Error;

/// What gets sent downstream for one visualization
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RemoteStatus {
    /// Map the service's fine-grained stage names onto the coarse lifecycle
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" | "starting" => RemoteStatus::Pending,
            "completed" | "complete" | "done" | "succeeded" => RemoteStatus::Completed,
            "failed" | "error" | "cancelled" | "canceled" => RemoteStatus::Failed,
            _ => RemoteStatus::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProgress {
    pub status: RemoteStatus,
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Image service is busy with another generation")]
    Busy,

    #[error("Image service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Remote task not found: {0}")]
    NotFound(String),

    #[error("Invalid response from image service: {0}")]
    InvalidResponse(String),

    #[error("Image service did not respond in time")]
    Timeout,
}

impl BackendError {
    /// Errors worth retrying on the next poll
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            BackendError::Status { status, .. } => *status >= 500,
            BackendError::Timeout | BackendError::Busy => true,
            BackendError::NotFound(_) | BackendError::InvalidResponse(_) => false,
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Start a generation and return the service's task id
    async fn submit(&self, request: &GenerationRequest) -> BackendResult<String>;

    async fn progress(&self, remote_id: &str) -> BackendResult<RemoteProgress>;

    /// Download the finished image
    async fn fetch(&self, remote_id: &str) -> BackendResult<GeneratedImage>;
}
