// ABOUTME: Typed HTTP client for the DroneGuide API
// ABOUTME: Wraps analysis, project and visualization endpoints and classifies failures

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const PROGRESS_TIMEOUT: Duration = Duration::from_secs(8);
const RESULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("A {0} request is already in progress")]
    Busy(&'static str),

    #[error("Channel lock failed: {0}")]
    Lock(#[from] std::io::Error),
}

impl ClientError {
    /// Timeouts, connection failures and 5xx responses are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ClientError::Api { status, .. } => *status >= 500 || *status == 429,
            ClientError::InvalidResponse(_) | ClientError::Busy(_) | ClientError::Lock(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedGeneration {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskProgress {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

/// Downloaded image bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// The two calls the generation poller needs
#[async_trait]
pub trait GenerationApi: Send + Sync {
    async fn progress(&self, task_id: &str) -> ClientResult<TaskProgress>;

    async fn fetch_result(&self, task_id: &str) -> ClientResult<FetchedImage>;
}

#[async_trait]
impl<T: GenerationApi + ?Sized> GenerationApi for Arc<T> {
    async fn progress(&self, task_id: &str) -> ClientResult<TaskProgress> {
        (**self).progress(task_id).await
    }

    async fn fetch_result(&self, task_id: &str) -> ClientResult<FetchedImage> {
        (**self).fetch_result(task_id).await
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Ids<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn error_from(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorEnvelope>(&text) {
            Ok(envelope) => ClientError::Api {
                status,
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => ClientError::Api {
                status,
                code: "HTTP_ERROR".to_string(),
                message: text,
            },
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn post(&self, path: &str, body: &Value) -> ClientResult<Value> {
        debug!(path, "POST");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn get(&self, path: &str) -> ClientResult<Value> {
        debug!(path, "GET");
        let response = self.client.get(self.url(path)).send().await?;
        Self::read_json(response).await
    }

    pub async fn health(&self) -> ClientResult<Value> {
        self.get("/health").await
    }

    pub async fn validate(
        &self,
        image: &str,
        current_step: u32,
        user_id: Option<&str>,
        project_id: Option<&str>,
    ) -> ClientResult<Value> {
        let mut body = json!(Ids { user_id, project_id });
        body["image"] = json!(image);
        body["currentStep"] = json!(current_step);
        self.post("/analysis/validate", &body).await
    }

    pub async fn voice_query(
        &self,
        query: &str,
        image: &str,
        current_step: u32,
        user_id: Option<&str>,
        project_id: Option<&str>,
    ) -> ClientResult<Value> {
        let mut body = json!(Ids { user_id, project_id });
        body["query"] = json!(query);
        body["image"] = json!(image);
        body["currentStep"] = json!(current_step);
        self.post("/analysis/voice-query", &body).await
    }

    pub async fn initialize_project(
        &self,
        user_id: &str,
        drone_type: Option<&str>,
    ) -> ClientResult<Value> {
        self.post(
            "/project/initialize",
            &json!({ "userId": user_id, "droneType": drone_type }),
        )
        .await
    }

    pub async fn list_projects(&self, user_id: &str) -> ClientResult<Value> {
        self.get(&format!("/project/{}", user_id)).await
    }

    pub async fn project_context(&self, user_id: &str, project_id: &str) -> ClientResult<Value> {
        self.get(&format!("/project/{}/{}/context", user_id, project_id))
            .await
    }

    pub async fn start_visualization(
        &self,
        prompt: &str,
        user_id: Option<&str>,
        project_id: Option<&str>,
    ) -> ClientResult<StartedGeneration> {
        let mut body = json!(Ids { user_id, project_id });
        body["prompt"] = json!(prompt);
        let response = self
            .client
            .post(self.url("/visualize"))
            .json(&body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    pub async fn cancel_visualization(&self, task_id: &str) -> ClientResult<Value> {
        let response = self
            .client
            .delete(self.url(&format!("/visualize/{}", task_id)))
            .send()
            .await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl GenerationApi for ApiClient {
    async fn progress(&self, task_id: &str) -> ClientResult<TaskProgress> {
        let response = self
            .client
            .get(self.url(&format!("/visualize/progress/{}", task_id)))
            .timeout(PROGRESS_TIMEOUT)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn fetch_result(&self, task_id: &str) -> ClientResult<FetchedImage> {
        let response = self
            .client
            .get(self.url(&format!("/visualize/result/{}", task_id)))
            .timeout(RESULT_TIMEOUT)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Self::error_from(response).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(ClientError::InvalidResponse(format!(
                "expected an image, got {}",
                content_type
            )));
        }

        let data = response.bytes().await?.to_vec();
        if data.is_empty() {
            return Err(ClientError::InvalidResponse("empty image".to_string()));
        }
        Ok(FetchedImage { content_type, data })
    }
}
