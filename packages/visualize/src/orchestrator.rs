// ABOUTME: Drives image generation tasks from submission to a terminal state
// ABOUTME: Submits downstream, then polls progress in a background task and stores the result

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use droneguide_core::{validate_prompt, ValidationError};
use droneguide_tasks::{GeneratedImage, GenerationTask, TaskError, TaskPatch, TaskStore};
use thiserror::Error;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::backend::{BackendError, GenerationRequest, ImageBackend, RemoteStatus};

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub poll_interval: Duration,
    /// Overall budget for one generation, measured from submission
    pub max_duration: Duration,
    pub submit_timeout: Duration,
    /// Limit on each progress check and image download
    pub request_timeout: Duration,
    /// Transient poll failures tolerated in a row before giving up
    pub max_consecutive_errors: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_duration: Duration::from_secs(30 * 60),
            submit_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            max_consecutive_errors: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Image service unavailable: {0}")]
    Submit(#[source] BackendError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Owns the lifecycle of generation tasks in a `TaskStore`.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    store: TaskStore,
    backend: Arc<dyn ImageBackend>,
    config: OrchestratorConfig,
    drivers: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl GenerationOrchestrator {
    pub fn new(store: TaskStore, backend: Arc<dyn ImageBackend>, config: OrchestratorConfig) -> Self {
        Self {
            store,
            backend,
            config,
            drivers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    fn drivers(&self) -> MutexGuard<'_, HashMap<String, AbortHandle>> {
        self.drivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Accept a visualization request.
    ///
    /// Returns once the downstream service has acknowledged the submission. If
    /// it refuses or times out, the task is removed and the error returned.
    pub async fn start_generation(
        &self,
        prompt: &str,
        user_id: Option<&str>,
        project_id: Option<&str>,
    ) -> GenerationResult<GenerationTask> {
        let prompt = validate_prompt(Some(prompt))?;
        let task = self.store.create(&prompt, user_id, project_id);
        let task_id = task.task_id.clone();

        info!(
            task_id = %task_id,
            prompt = %task.prompt_preview,
            "Submitting image generation"
        );

        let request = GenerationRequest {
            prompt,
            user_id: user_id.map(str::to_string),
            project_id: project_id.map(str::to_string),
        };

        let submitted =
            tokio::time::timeout(self.config.submit_timeout, self.backend.submit(&request)).await;
        let remote_id = match submitted {
            Ok(Ok(remote_id)) => remote_id,
            Ok(Err(e)) => {
                self.store.delete(&task_id);
                error!(task_id = %task_id, error = %e, "Image service rejected generation");
                return Err(GenerationError::Submit(e));
            }
            Err(_) => {
                self.store.delete(&task_id);
                error!(task_id = %task_id, "Image service submission timed out");
                return Err(GenerationError::Submit(BackendError::Timeout));
            }
        };

        let task = self.store.update(&task_id, TaskPatch::running(&remote_id))?;
        self.spawn_driver(task_id, remote_id);
        Ok(task)
    }

    fn spawn_driver(&self, task_id: String, remote_id: String) {
        let orchestrator = self.clone();
        let key = task_id.clone();

        // Registered under the lock so the driver cannot deregister before it is recorded
        let mut drivers = self.drivers();
        let handle = tokio::spawn(async move {
            orchestrator.drive(&task_id, &remote_id).await;
            orchestrator.drivers().remove(&task_id);
        });
        drivers.insert(key, handle.abort_handle());
    }

    async fn drive(&self, task_id: &str, remote_id: &str) {
        let started = Instant::now();
        let mut interval = tokio::time::interval_at(
            started + self.config.poll_interval,
            self.config.poll_interval,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_errors = 0u32;

        loop {
            interval.tick().await;

            if started.elapsed() >= self.config.max_duration {
                self.report_failure(
                    task_id,
                    format!(
                        "Generation timed out after {} seconds",
                        self.config.max_duration.as_secs()
                    ),
                );
                return;
            }

            let checked =
                tokio::time::timeout(self.config.request_timeout, self.backend.progress(remote_id))
                    .await
                    .unwrap_or(Err(BackendError::Timeout));
            let progress = match checked {
                Ok(progress) => {
                    consecutive_errors = 0;
                    progress
                }
                Err(BackendError::NotFound(_)) => {
                    self.report_failure(task_id, "Image service lost track of the task");
                    return;
                }
                Err(e) if e.is_transient() => {
                    consecutive_errors += 1;
                    warn!(
                        task_id = %task_id,
                        attempt = consecutive_errors,
                        error = %e,
                        "Progress check failed"
                    );
                    if consecutive_errors >= self.config.max_consecutive_errors {
                        self.report_failure(
                            task_id,
                            format!("Lost contact with image service: {}", e),
                        );
                        return;
                    }
                    continue;
                }
                Err(e) => {
                    self.report_failure(task_id, format!("Image service error: {}", e));
                    return;
                }
            };

            match progress.status {
                RemoteStatus::Completed => {
                    let fetched =
                        tokio::time::timeout(self.config.request_timeout, self.backend.fetch(remote_id))
                            .await
                            .unwrap_or(Err(BackendError::Timeout));
                    match fetched {
                        Ok(image) if !image.is_empty() => {
                            self.report_completion(task_id, image);
                        }
                        Ok(_) => self.report_failure(task_id, "Image service returned an empty image"),
                        Err(e) => self.report_failure(
                            task_id,
                            format!("Failed to retrieve generated image: {}", e),
                        ),
                    }
                    return;
                }
                RemoteStatus::Failed => {
                    let reason = progress
                        .error
                        .filter(|e| !e.trim().is_empty())
                        .or_else(|| Some(progress.message).filter(|m| !m.trim().is_empty()))
                        .unwrap_or_else(|| "Image generation failed".to_string());
                    self.report_failure(task_id, reason);
                    return;
                }
                RemoteStatus::Pending | RemoteStatus::Running => {
                    if !self.report_progress(task_id, progress.progress, progress.message) {
                        return;
                    }
                }
            }
        }
    }

    /// Record downstream progress. Returns false once the task no longer accepts updates.
    pub fn report_progress(&self, task_id: &str, progress: u8, message: impl Into<String>) -> bool {
        match self.store.update(task_id, TaskPatch::progress(progress, message)) {
            Ok(task) => {
                debug!(task_id = %task_id, progress = task.progress, "Generation progress");
                true
            }
            Err(e) => {
                debug!(task_id = %task_id, error = %e, "Stopping generation driver");
                false
            }
        }
    }

    pub fn report_completion(&self, task_id: &str, image: GeneratedImage) {
        let size = image.len();
        match self.store.update(task_id, TaskPatch::completed(image)) {
            Ok(_) => info!(task_id = %task_id, size, "Generation completed"),
            Err(e) => warn!(task_id = %task_id, error = %e, "Could not record completion"),
        }
    }

    pub fn report_failure(&self, task_id: &str, reason: impl Into<String>) {
        let reason = reason.into();
        match self.store.update(task_id, TaskPatch::failed(reason.clone())) {
            Ok(_) => error!(task_id = %task_id, error = %reason, "Generation failed"),
            Err(e) => warn!(task_id = %task_id, error = %e, "Could not record failure"),
        }
    }

    /// Stop a generation. The task becomes `failed` with a cancellation error.
    pub fn cancel(&self, task_id: &str) -> GenerationResult<GenerationTask> {
        let task = self
            .store
            .update(task_id, TaskPatch::failed("Generation cancelled"))?;

        if let Some(handle) = self.drivers().remove(task_id) {
            handle.abort();
        }
        info!(task_id = %task_id, "Generation cancelled");
        Ok(task)
    }

    /// Number of generations still being driven
    pub fn active_count(&self) -> usize {
        self.drivers().len()
    }

    /// Abort every driver, leaving the tasks as they are
    pub fn shutdown(&self) {
        for (_, handle) in self.drivers().drain() {
            handle.abort();
        }
    }
}
