// ABOUTME: Gemini client for multimodal text generation
// ABOUTME: Sends prompt and optional inline image, returns the model's text and token usage

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use droneguide_config::{constants, defaults};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AIServiceError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("No API key configured")]
    NoApiKey,

    #[error("Invalid response format")]
    InvalidResponse,
}

pub type AIServiceResult<T> = Result<T, AIServiceError>;

/// Base64 image sent alongside a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn jpeg(data: impl Into<String>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
}

impl ModelRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image: InlineImage) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_token_count + self.candidates_token_count
    }
}

#[derive(Debug)]
pub struct AIResponse<T> {
    pub data: T,
    pub usage: Usage,
}

/// Anything that can turn a prompt (and optional image) into text
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: ModelRequest) -> AIServiceResult<AIResponse<String>>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// REST client for the Gemini `generateContent` endpoint
pub struct GeminiService {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiService {
    /// Create HTTP client with timeout configuration
    fn create_client() -> AIServiceResult<Client> {
        Ok(Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?)
    }

    pub fn new(api_key: Option<String>, model: impl Into<String>) -> AIServiceResult<Self> {
        Ok(Self {
            client: Self::create_client()?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: defaults::GEMINI_API_URL.to_string(),
        })
    }

    /// Reads GEMINI_API_KEY, GEMINI_MODEL and GEMINI_API_URL
    pub fn from_env() -> AIServiceResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, resolving variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AIServiceResult<Self> {
        let api_key = lookup(constants::GEMINI_API_KEY);
        if api_key.is_none() {
            info!(
                "{} not set - analysis endpoints will fail until it is configured",
                constants::GEMINI_API_KEY
            );
        }

        let model = lookup(constants::GEMINI_MODEL)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| defaults::GEMINI_MODEL.to_string());
        if model != defaults::GEMINI_MODEL {
            info!("Using custom Gemini model: {}", model);
        }

        let service = Self::new(api_key, model)?;
        Ok(match lookup(constants::GEMINI_API_URL) {
            Some(url) if !url.trim().is_empty() => service.with_base_url(url),
            _ => service,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiService {
    async fn generate(&self, request: ModelRequest) -> AIServiceResult<AIResponse<String>> {
        let api_key = self.api_key.as_ref().ok_or(AIServiceError::NoApiKey)?;
        let has_image = request.image.is_some();

        let mut parts = vec![Part::Text {
            text: request.prompt,
        }];
        if let Some(image) = request.image {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type,
                    data: image.data,
                },
            });
        }
        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        info!(
            "Making Gemini API request: model={}, image={}",
            self.model, has_image
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("Gemini API request timed out");
                    AIServiceError::ApiError(format!(
                        "Request timed out after {} seconds",
                        REQUEST_TIMEOUT.as_secs()
                    ))
                } else if e.is_connect() {
                    error!("Failed to connect to Gemini API: {}", e);
                    AIServiceError::ApiError(format!("Connection failed: {}", e))
                } else {
                    error!("Gemini API request failed: {}", e);
                    AIServiceError::RequestFailed(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Gemini API error: {} - {}", status, error_text);
            return Err(AIServiceError::ApiError(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AIServiceError::ParseError(e.to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or(AIServiceError::InvalidResponse)?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            return Err(AIServiceError::InvalidResponse);
        }

        let usage = parsed.usage_metadata.unwrap_or_default();
        info!(
            "Received Gemini response: chars={}, tokens={}",
            text.len(),
            usage.total_tokens()
        );

        Ok(AIResponse { data: text, usage })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
