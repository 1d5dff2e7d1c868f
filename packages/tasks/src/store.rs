// ABOUTME: In-memory registry of generation tasks with guarded updates
// ABOUTME: Enforces monotonic status and progress, and garbage-collects finished results

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use droneguide_core::{generate_task_id, truncate};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::types::{GeneratedImage, GenerationTask, TaskPatch, TaskStatus};

const PROMPT_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Task {task_id} already {status}")]
    Finished { task_id: String, status: TaskStatus },

    #[error("Task is not complete (status: {0})")]
    NotReady(TaskStatus),

    #[error("Generation failed: {0}")]
    Failed(String),
}

pub type TaskResult<T> = Result<T, TaskError>;

#[derive(Debug, Clone, Copy)]
pub struct TaskStoreConfig {
    /// Tasks older than this are dropped regardless of state
    pub max_age: Duration,
    /// How long a fetched result stays available for re-download
    pub fetched_grace: Duration,
}

impl Default for TaskStoreConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(60 * 60),
            fetched_grace: Duration::from_secs(5 * 60),
        }
    }
}

type Tasks = Arc<Mutex<HashMap<String, GenerationTask>>>;

/// Registry of generation tasks. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Tasks,
    config: TaskStoreConfig,
}

fn lock(tasks: &Mutex<HashMap<String, GenerationTask>>) -> MutexGuard<'_, HashMap<String, GenerationTask>> {
    tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

fn purge(tasks: &Mutex<HashMap<String, GenerationTask>>, config: TaskStoreConfig, now: DateTime<Utc>) -> usize {
    let max_age = to_chrono(config.max_age);
    let grace = to_chrono(config.fetched_grace);

    let mut map = lock(tasks);
    let before = map.len();
    map.retain(|_, task| {
        if now - task.created_at > max_age {
            return false;
        }
        match task.result_fetched_at {
            Some(fetched) => now - fetched <= grace,
            None => true,
        }
    });
    before - map.len()
}

impl TaskStore {
    pub fn new(config: TaskStoreConfig) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    /// Register a new task in the `queued` state
    pub fn create(
        &self,
        prompt: &str,
        user_id: Option<&str>,
        project_id: Option<&str>,
    ) -> GenerationTask {
        let now = Utc::now();
        let task = GenerationTask {
            task_id: generate_task_id(),
            status: TaskStatus::Queued,
            progress: 0,
            message: "Queued for generation".to_string(),
            error: None,
            prompt_preview: truncate(prompt, PROMPT_PREVIEW_CHARS),
            user_id: user_id.map(str::to_string),
            project_id: project_id.map(str::to_string),
            created_at: now,
            updated_at: now,
            remote_id: None,
            result: None,
            result_fetched_at: None,
        };

        lock(&self.tasks).insert(task.task_id.clone(), task.clone());
        debug!(task_id = %task.task_id, "Created generation task");
        task
    }

    pub fn get(&self, task_id: &str) -> TaskResult<GenerationTask> {
        lock(&self.tasks)
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    /// Apply a patch. Terminal tasks are immutable, status never moves backwards,
    /// and progress never decreases.
    pub fn update(&self, task_id: &str, patch: TaskPatch) -> TaskResult<GenerationTask> {
        let mut map = lock(&self.tasks);
        let task = map
            .get_mut(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        if task.status.is_terminal() {
            return Err(TaskError::Finished {
                task_id: task_id.to_string(),
                status: task.status,
            });
        }

        if let Some(next) = patch.status {
            if !task.status.can_transition_to(next) {
                return Err(TaskError::InvalidTransition {
                    from: task.status,
                    to: next,
                });
            }
            task.status = next;
        }

        if let Some(progress) = patch.progress {
            task.progress = task.progress.max(progress.min(100));
        }
        if task.status == TaskStatus::Completed {
            task.progress = 100;
        }
        if let Some(message) = patch.message {
            task.message = message;
        }
        if let Some(remote_id) = patch.remote_id {
            task.remote_id = Some(remote_id);
        }
        if let Some(result) = patch.result {
            task.result = Some(result);
        }
        if let Some(error) = patch.error {
            task.error = Some(error);
        }
        if task.status == TaskStatus::Failed && task.error.is_none() {
            task.error = Some("Generation failed".to_string());
        }

        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    pub fn delete(&self, task_id: &str) -> bool {
        lock(&self.tasks).remove(task_id).is_some()
    }

    /// Hand out the finished image and start its release grace period
    pub fn fetch_result(&self, task_id: &str) -> TaskResult<GeneratedImage> {
        let mut map = lock(&self.tasks);
        let task = map
            .get_mut(task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        match task.status {
            TaskStatus::Completed => {}
            TaskStatus::Failed => {
                return Err(TaskError::Failed(
                    task.error.clone().unwrap_or_else(|| "unknown error".to_string()),
                ))
            }
            status => return Err(TaskError::NotReady(status)),
        }

        let image = task.result.clone().ok_or_else(|| {
            warn!(task_id = %task_id, "Completed task has no stored image");
            TaskError::Failed("result image missing".to_string())
        })?;

        if task.result_fetched_at.is_none() {
            task.result_fetched_at = Some(Utc::now());
        }
        Ok(image)
    }

    pub fn list(&self) -> Vec<GenerationTask> {
        let mut tasks: Vec<GenerationTask> = lock(&self.tasks).values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Drop tasks past their maximum age and results fetched longer ago than the grace period
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        purge(&self.tasks, self.config, now)
    }

    /// Run `purge_expired` periodically until the store is dropped
    pub fn spawn_janitor(&self, every: Duration) -> JoinHandle<()> {
        let tasks: Weak<Mutex<HashMap<String, GenerationTask>>> = Arc::downgrade(&self.tasks);
        let config = self.config;

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + every;
            let mut interval = tokio::time::interval_at(start, every);

            loop {
                interval.tick().await;

                let Some(tasks) = tasks.upgrade() else {
                    break;
                };

                let removed = purge(&tasks, config, Utc::now());
                if removed > 0 {
                    info!(removed, "Released expired generation tasks");
                }
            }
        })
    }
}
