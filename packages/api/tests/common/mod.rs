// ABOUTME: Common test utilities for API integration tests
// ABOUTME: Test server with in-memory storage, a queued fake model and an instant image backend

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use droneguide_ai::{
    AIResponse, AIServiceError, AIServiceResult, AssemblyAssistant, GenerativeModel,
    ModelRequest, Usage,
};
use droneguide_api::{create_api_router, AppState, RateLimitConfig, RateLimitLayer};
use droneguide_cache::ResponseCache;
use droneguide_storage::{ProjectStorage, SqliteProjectStorage};
use droneguide_tasks::{GeneratedImage, TaskStore};
use droneguide_visualize::{
    BackendError, BackendResult, GenerationOrchestrator, GenerationRequest, ImageBackend,
    OrchestratorConfig, RemoteProgress, RemoteStatus,
};
use serde_json::Value;

pub const JPEG_BYTES: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

/// Model that answers from a queue; an empty queue answers "OK"
#[derive(Default)]
pub struct QueuedModel {
    replies: Mutex<VecDeque<AIServiceResult<String>>>,
    pub calls: AtomicUsize,
}

impl QueuedModel {
    pub fn reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn fail(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(AIServiceError::ApiError(message.to_string())));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for QueuedModel {
    async fn generate(&self, _request: ModelRequest) -> AIServiceResult<AIResponse<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("OK".to_string()))
            .map(|data| AIResponse {
                data,
                usage: Usage::default(),
            })
    }

    fn model_name(&self) -> &str {
        "queued-test-model"
    }
}

/// Image service that finishes every generation on the first poll
#[derive(Default)]
pub struct InstantBackend {
    pub refuse: bool,
}

#[async_trait]
impl ImageBackend for InstantBackend {
    async fn submit(&self, _request: &GenerationRequest) -> BackendResult<String> {
        if self.refuse {
            return Err(BackendError::Busy);
        }
        Ok("remote-1".to_string())
    }

    async fn progress(&self, _remote_id: &str) -> BackendResult<RemoteProgress> {
        Ok(RemoteProgress {
            status: RemoteStatus::Completed,
            progress: 100,
            message: "Image generated successfully".to_string(),
            error: None,
        })
    }

    async fn fetch(&self, _remote_id: &str) -> BackendResult<GeneratedImage> {
        Ok(GeneratedImage::jpeg(JPEG_BYTES.to_vec()))
    }
}

pub struct TestContext {
    pub base_url: String,
    pub client: reqwest::Client,
    pub model: Arc<QueuedModel>,
    pub storage: Arc<SqliteProjectStorage>,
    pub tasks: TaskStore,
}

pub struct TestOptions {
    pub analysis_rpm: u32,
    pub refuse_generation: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            analysis_rpm: 1_000,
            refuse_generation: false,
        }
    }
}

pub async fn setup_test_server() -> TestContext {
    setup_test_server_with(TestOptions::default()).await
}

/// Start the full API on a random local port
pub async fn setup_test_server_with(options: TestOptions) -> TestContext {
    let storage = Arc::new(
        SqliteProjectStorage::in_memory()
            .await
            .expect("Failed to create in-memory storage"),
    );
    let model = Arc::new(QueuedModel::default());
    let tasks = TaskStore::default();
    let orchestrator = GenerationOrchestrator::new(
        tasks.clone(),
        Arc::new(InstantBackend {
            refuse: options.refuse_generation,
        }),
        OrchestratorConfig {
            poll_interval: Duration::from_millis(10),
            ..OrchestratorConfig::default()
        },
    );

    let state = AppState {
        storage: storage.clone() as Arc<dyn ProjectStorage>,
        assistant: AssemblyAssistant::new(model.clone()),
        cache: ResponseCache::default(),
        orchestrator,
    };
    let rate_limit = RateLimitLayer::new(RateLimitConfig {
        enabled: true,
        analysis_rpm: options.analysis_rpm,
    });
    let app = create_api_router(state, rate_limit);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestContext {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        model,
        storage,
        tasks,
    }
}

impl TestContext {
    pub async fn get(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    pub async fn delete(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// Poll the progress endpoint until the task reaches a terminal state
    pub async fn wait_for_task(&self, task_id: &str) -> Value {
        for _ in 0..200 {
            let (_, body) = self
                .get(&format!("/api/visualize/progress/{}", task_id))
                .await;
            if matches!(body["status"].as_str(), Some("completed" | "failed")) {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} did not finish", task_id);
    }
}
