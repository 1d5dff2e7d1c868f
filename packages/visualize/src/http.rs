// ABOUTME: HTTP client for the image generation service
// ABOUTME: Implements ImageBackend against the /generate, /progress and /result endpoints

use std::time::Duration;

use async_trait::async_trait;
use droneguide_tasks::GeneratedImage;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::backend::{
    BackendError, BackendResult, GenerationRequest, ImageBackend, RemoteProgress, RemoteStatus,
};

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const PROGRESS_TIMEOUT: Duration = Duration::from_secs(10);
const RESULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    #[serde(rename = "async")]
    run_async: bool,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(alias = "taskId")]
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    status: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Talks to the diffusion service over HTTP
#[derive(Debug, Clone)]
pub struct HttpImageBackend {
    client: Client,
    base_url: String,
}

impl HttpImageBackend {
    pub fn new(base_url: impl Into<String>) -> BackendResult<Self> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Request(e)
        }
    }

    async fn status_error(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.error.or(body.message))
            .unwrap_or(text);
        BackendError::Status { status, message }
    }
}

#[async_trait]
impl ImageBackend for HttpImageBackend {
    async fn submit(&self, request: &GenerationRequest) -> BackendResult<String> {
        let body = SubmitBody {
            prompt: &request.prompt,
            user_id: request.user_id.as_deref(),
            project_id: request.project_id.as_deref(),
            run_async: true,
        };

        let response = self
            .client
            .post(self.url("/generate"))
            .timeout(SUBMIT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Image service submit failed: {}", e);
                Self::map_send_error(e)
            })?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::Busy);
        }
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        info!(remote_id = %submitted.task_id, "Image service accepted generation");
        Ok(submitted.task_id)
    }

    async fn progress(&self, remote_id: &str) -> BackendResult<RemoteProgress> {
        let response = self
            .client
            .get(self.url(&format!("/progress/{}", remote_id)))
            .timeout(PROGRESS_TIMEOUT)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(remote_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let body: ProgressResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        debug!(
            remote_id = %remote_id,
            status = %body.status,
            progress = body.progress,
            "Image service progress"
        );

        Ok(RemoteProgress {
            status: RemoteStatus::from_remote(&body.status),
            progress: body.progress.clamp(0.0, 100.0).round() as u8,
            message: body.message,
            error: body.error,
        })
    }

    async fn fetch(&self, remote_id: &str) -> BackendResult<GeneratedImage> {
        let response = self
            .client
            .get(self.url(&format!("/result/{}", remote_id)))
            .timeout(RESULT_TIMEOUT)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(remote_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(BackendError::InvalidResponse(format!(
                "expected an image, got {}",
                content_type
            )));
        }

        let bytes = response.bytes().await.map_err(Self::map_send_error)?;
        if bytes.is_empty() {
            return Err(BackendError::InvalidResponse("empty image".to_string()));
        }

        info!(remote_id = %remote_id, size = bytes.len(), "Fetched generated image");
        Ok(GeneratedImage::new(content_type, bytes.to_vec()))
    }
}
