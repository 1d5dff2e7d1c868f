// ABOUTME: Persistence layer for assembly projects
// ABOUTME: Storage trait, error types and the SQLite implementation

use async_trait::async_trait;
use droneguide_core::{ComponentInput, Project, ProjectContext, Step};
use thiserror::Error;

pub mod sqlite;

pub use sqlite::SqliteProjectStorage;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Project not found")]
    NotFound,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of merging components into a stored project
#[derive(Debug, Clone)]
pub struct ComponentUpdate {
    pub project: Project,
    pub added: usize,
}

/// Persistence for per-user assembly projects.
///
/// Projects are keyed by `(user_id, project_id)` and are never deleted.
#[async_trait]
pub trait ProjectStorage: Send + Sync {
    async fn get_project(&self, user_id: &str, project_id: &str)
        -> StorageResult<Option<Project>>;

    /// Return the project, creating it with defaults on first reference
    async fn get_or_create_project(
        &self,
        user_id: &str,
        project_id: &str,
        project_name: Option<&str>,
    ) -> StorageResult<Project>;

    /// Projects of a user, most recently touched first
    async fn list_projects(&self, user_id: &str) -> StorageResult<Vec<Project>>;

    /// Merge components into the project's list, writing only when something new was added
    async fn reconcile_components(
        &self,
        user_id: &str,
        project_id: &str,
        incoming: Vec<ComponentInput>,
    ) -> StorageResult<ComponentUpdate>;

    /// Append a completed step and advance `current_step` past it
    async fn add_completed_step(
        &self,
        user_id: &str,
        project_id: &str,
        step: Step,
    ) -> StorageResult<Project>;

    async fn update_drone_type(
        &self,
        user_id: &str,
        project_id: &str,
        drone_type: &str,
    ) -> StorageResult<Project>;

    /// Record that the user interacted with the project just now
    async fn touch(&self, user_id: &str, project_id: &str) -> StorageResult<()>;

    async fn get_project_context(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> StorageResult<ProjectContext> {
        self.get_project(user_id, project_id)
            .await?
            .map(|project| project.context())
            .ok_or(StorageError::NotFound)
    }
}
