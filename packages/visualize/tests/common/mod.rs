// ABOUTME: Shared helpers for orchestrator integration tests
// ABOUTME: A scripted in-process image backend and task polling utilities

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use droneguide_tasks::{GeneratedImage, GenerationTask, TaskStore};
use droneguide_visualize::{
    BackendError, BackendResult, GenerationOrchestrator, GenerationRequest, ImageBackend,
    OrchestratorConfig, RemoteProgress, RemoteStatus,
};

pub fn running(progress: u8) -> BackendResult<RemoteProgress> {
    Ok(RemoteProgress {
        status: RemoteStatus::Running,
        progress,
        message: format!("Generating image... {}%", progress),
        error: None,
    })
}

pub fn completed() -> BackendResult<RemoteProgress> {
    Ok(RemoteProgress {
        status: RemoteStatus::Completed,
        progress: 100,
        message: "Image generated successfully".to_string(),
        error: None,
    })
}

pub fn failed(error: &str) -> BackendResult<RemoteProgress> {
    Ok(RemoteProgress {
        status: RemoteStatus::Failed,
        progress: 0,
        message: "Generation failed".to_string(),
        error: Some(error.to_string()),
    })
}

/// Backend that replays a fixed script of responses
#[derive(Default)]
pub struct ScriptedBackend {
    submit_error: Mutex<Option<BackendError>>,
    progress: Mutex<VecDeque<BackendResult<RemoteProgress>>>,
    image: Mutex<Option<BackendResult<GeneratedImage>>>,
    /// Progress checks never answer
    stall_progress: bool,
    /// Image downloads never answer
    stall_fetch: bool,
    pub progress_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn with_progress(script: Vec<BackendResult<RemoteProgress>>) -> Self {
        let backend = Self::default();
        *backend.progress.lock().unwrap() = script.into();
        *backend.image.lock().unwrap() = Some(Ok(GeneratedImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xE0])));
        backend
    }

    pub fn failing_submit(error: BackendError) -> Self {
        let backend = Self::default();
        *backend.submit_error.lock().unwrap() = Some(error);
        backend
    }

    pub fn stalled() -> Self {
        Self {
            stall_progress: true,
            ..Self::default()
        }
    }

    pub fn stalling_fetch(mut self) -> Self {
        self.stall_fetch = true;
        self
    }

    pub fn with_image(self, image: BackendResult<GeneratedImage>) -> Self {
        *self.image.lock().unwrap() = Some(image);
        self
    }
}

#[async_trait]
impl ImageBackend for ScriptedBackend {
    async fn submit(&self, _request: &GenerationRequest) -> BackendResult<String> {
        match self.submit_error.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok("remote-1".to_string()),
        }
    }

    async fn progress(&self, _remote_id: &str) -> BackendResult<RemoteProgress> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_progress {
            std::future::pending::<()>().await;
        }
        // An exhausted script keeps reporting an unfinished generation
        self.progress
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| running(50))
    }

    async fn fetch(&self, remote_id: &str) -> BackendResult<GeneratedImage> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_fetch {
            std::future::pending::<()>().await;
        }
        self.image
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(BackendError::NotFound(remote_id.to_string())))
    }
}

pub fn orchestrator(backend: Arc<ScriptedBackend>, config: OrchestratorConfig) -> GenerationOrchestrator {
    GenerationOrchestrator::new(TaskStore::default(), backend, config)
}

pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        poll_interval: Duration::from_secs(2),
        max_duration: Duration::from_secs(600),
        submit_timeout: Duration::from_secs(30),
        request_timeout: Duration::from_secs(10),
        max_consecutive_errors: 3,
    }
}

/// Observe a task until it reaches a terminal state, recording every progress value seen
pub async fn wait_for_terminal(store: &TaskStore, task_id: &str) -> (GenerationTask, Vec<u8>) {
    let mut seen = Vec::new();
    for _ in 0..2_000 {
        let task = store.get(task_id).expect("task should exist");
        seen.push(task.progress);
        if task.status.is_terminal() {
            return (task, seen);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("task {} never reached a terminal state", task_id);
}
