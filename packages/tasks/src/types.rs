// ABOUTME: Generation task type definitions
// ABOUTME: Status lifecycle, task records, result handles and update patches

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Queued => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produced image bytes. Cloning shares the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub content_type: String,
    pub data: Arc<Vec<u8>>,
}

impl GeneratedImage {
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            data: Arc::new(data),
        }
    }

    pub fn jpeg(data: Vec<u8>) -> Self {
        Self::new("image/jpeg", data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTask {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub prompt_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Identifier assigned by the downstream image service
    #[serde(skip)]
    pub remote_id: Option<String>,
    #[serde(skip)]
    pub result: Option<GeneratedImage>,
    #[serde(skip)]
    pub result_fetched_at: Option<DateTime<Utc>>,
}

impl GenerationTask {
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }
}

/// Partial update applied through `TaskStore::update`.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub remote_id: Option<String>,
    pub result: Option<GeneratedImage>,
}

impl TaskPatch {
    pub fn running(remote_id: impl Into<String>) -> Self {
        Self {
            status: Some(TaskStatus::Running),
            message: Some("Generation started".to_string()),
            remote_id: Some(remote_id.into()),
            ..Default::default()
        }
    }

    pub fn progress(progress: u8, message: impl Into<String>) -> Self {
        Self {
            progress: Some(progress),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn completed(image: GeneratedImage) -> Self {
        Self {
            status: Some(TaskStatus::Completed),
            progress: Some(100),
            message: Some("Image generated successfully".to_string()),
            result: Some(image),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: Some(TaskStatus::Failed),
            message: Some(format!("Generation failed: {}", error)),
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_monotonic() {
        use TaskStatus::*;

        assert!(Queued.can_transition_to(Running));
        assert!(Queued.can_transition_to(Failed));
        assert!(Running.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(!Running.can_transition_to(Queued));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn test_failed_patch_carries_error() {
        let patch = TaskPatch::failed("model crashed");
        assert_eq!(patch.status, Some(TaskStatus::Failed));
        assert_eq!(patch.error.as_deref(), Some("model crashed"));
    }
}
