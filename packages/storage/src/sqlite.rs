// ABOUTME: SQLite implementation of ProjectStorage
// ABOUTME: JSON-encoded component and step columns keyed by (user_id, project_id)

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use droneguide_core::{default_project_name, merge_components, ComponentInput, Project, Step};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{ComponentUpdate, ProjectStorage, StorageError, StorageResult};

const PROJECT_COLUMNS: &str = "user_id, project_id, project_name, current_step, drone_type, \
     components, completed_steps, last_interaction, created_at";

/// SQLite implementation of ProjectStorage
pub struct SqliteProjectStorage {
    pool: SqlitePool,
    // Serializes read-modify-write updates of the JSON columns
    write_lock: Mutex<()>,
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::Database(format!("Invalid timestamp '{}': {}", raw, e)))
}

impl SqliteProjectStorage {
    /// Open (or create) a database file and run migrations
    pub async fn connect(database_path: &Path) -> StorageResult<Self> {
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
            }
        }

        let database_url = format!("sqlite:{}", database_path.display());

        if !sqlx::Sqlite::database_exists(&database_url)
            .await
            .map_err(StorageError::Sqlx)?
        {
            debug!("Creating database at: {}", database_url);
            sqlx::Sqlite::create_database(&database_url)
                .await
                .map_err(StorageError::Sqlx)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&database_url)
            .await
            .map_err(StorageError::Sqlx)?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await
            .map_err(StorageError::Sqlx)?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await
            .map_err(StorageError::Sqlx)?;

        info!(path = %database_path.display(), "Opened project database");
        Self::from_pool(pool).await
    }

    /// In-memory database with a single connection, for tests and ephemeral runs
    pub async fn in_memory() -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1) // Single connection for in-memory
            .connect("sqlite::memory:")
            .await
            .map_err(StorageError::Sqlx)?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying migrations first
    pub async fn from_pool(pool: SqlitePool) -> StorageResult<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_project(row: &SqliteRow) -> StorageResult<Project> {
        let components_json: String = row.try_get("components")?;
        let steps_json: String = row.try_get("completed_steps")?;
        let last_interaction: String = row.try_get("last_interaction")?;
        let created_at: String = row.try_get("created_at")?;
        let current_step: i64 = row.try_get("current_step")?;

        Ok(Project {
            user_id: row.try_get("user_id")?,
            project_id: row.try_get("project_id")?,
            project_name: row.try_get("project_name")?,
            current_step: u32::try_from(current_step).unwrap_or(1).max(1),
            drone_type: row.try_get("drone_type")?,
            components: serde_json::from_str(&components_json)?,
            completed_steps: serde_json::from_str(&steps_json)?,
            last_interaction: parse_timestamp(&last_interaction)?,
            created_at: parse_timestamp(&created_at)?,
        })
    }

    async fn fetch(&self, user_id: &str, project_id: &str) -> StorageResult<Option<Project>> {
        let query = format!(
            "SELECT {} FROM assembly_progress WHERE user_id = ? AND project_id = ?",
            PROJECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        row.as_ref().map(Self::row_to_project).transpose()
    }

    async fn fetch_existing(&self, user_id: &str, project_id: &str) -> StorageResult<Project> {
        self.fetch(user_id, project_id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn insert_if_missing(
        &self,
        user_id: &str,
        project_id: &str,
        project_name: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now();
        let name = project_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_project_name(now));

        let result = sqlx::query(
            "INSERT INTO assembly_progress \
             (user_id, project_id, project_name, current_step, components, completed_steps, last_interaction, created_at) \
             VALUES (?, ?, ?, 1, '[]', '[]', ?, ?) \
             ON CONFLICT (user_id, project_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(project_id)
        .bind(&name)
        .bind(format_timestamp(now))
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        if result.rows_affected() > 0 {
            info!(user_id = %user_id, project_id = %project_id, name = %name, "Created project");
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectStorage for SqliteProjectStorage {
    async fn get_project(
        &self,
        user_id: &str,
        project_id: &str,
    ) -> StorageResult<Option<Project>> {
        self.fetch(user_id, project_id).await
    }

    async fn get_or_create_project(
        &self,
        user_id: &str,
        project_id: &str,
        project_name: Option<&str>,
    ) -> StorageResult<Project> {
        self.insert_if_missing(user_id, project_id, project_name)
            .await?;
        self.fetch_existing(user_id, project_id).await
    }

    async fn list_projects(&self, user_id: &str) -> StorageResult<Vec<Project>> {
        let query = format!(
            "SELECT {} FROM assembly_progress WHERE user_id = ? ORDER BY last_interaction DESC",
            PROJECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Sqlx)?;

        rows.iter().map(Self::row_to_project).collect()
    }

    async fn reconcile_components(
        &self,
        user_id: &str,
        project_id: &str,
        incoming: Vec<ComponentInput>,
    ) -> StorageResult<ComponentUpdate> {
        let _guard = self.write_lock.lock().await;
        self.insert_if_missing(user_id, project_id, None).await?;
        let mut project = self.fetch_existing(user_id, project_id).await?;

        let outcome = merge_components(&project.components, incoming);
        if !outcome.changed() {
            debug!(user_id = %user_id, project_id = %project_id, "No new components to store");
            return Ok(ComponentUpdate { project, added: 0 });
        }

        let now = Utc::now();
        sqlx::query(
            "UPDATE assembly_progress SET components = ?, last_interaction = ? \
             WHERE user_id = ? AND project_id = ?",
        )
        .bind(serde_json::to_string(&outcome.merged)?)
        .bind(format_timestamp(now))
        .bind(user_id)
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        info!(
            user_id = %user_id,
            project_id = %project_id,
            added = outcome.added,
            total = outcome.merged.len(),
            "Stored new components"
        );

        project.components = outcome.merged;
        project.last_interaction = now;
        Ok(ComponentUpdate {
            project,
            added: outcome.added,
        })
    }

    async fn add_completed_step(
        &self,
        user_id: &str,
        project_id: &str,
        step: Step,
    ) -> StorageResult<Project> {
        let _guard = self.write_lock.lock().await;
        self.insert_if_missing(user_id, project_id, None).await?;
        let mut project = self.fetch_existing(user_id, project_id).await?;

        let now = Utc::now();
        project.current_step = step.step_number.saturating_add(1).max(1);
        project.completed_steps.push(step);
        project.last_interaction = now;

        let mut tx = self.pool.begin().await.map_err(StorageError::Sqlx)?;
        sqlx::query(
            "UPDATE assembly_progress SET completed_steps = ?, current_step = ?, last_interaction = ? \
             WHERE user_id = ? AND project_id = ?",
        )
        .bind(serde_json::to_string(&project.completed_steps)?)
        .bind(i64::from(project.current_step))
        .bind(format_timestamp(now))
        .bind(user_id)
        .bind(project_id)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Sqlx)?;
        tx.commit().await.map_err(StorageError::Sqlx)?;

        info!(
            user_id = %user_id,
            project_id = %project_id,
            current_step = project.current_step,
            "Recorded completed step"
        );
        Ok(project)
    }

    async fn update_drone_type(
        &self,
        user_id: &str,
        project_id: &str,
        drone_type: &str,
    ) -> StorageResult<Project> {
        self.insert_if_missing(user_id, project_id, None).await?;
        sqlx::query(
            "UPDATE assembly_progress SET drone_type = ?, last_interaction = ? \
             WHERE user_id = ? AND project_id = ?",
        )
        .bind(drone_type)
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;

        self.fetch_existing(user_id, project_id).await
    }

    async fn touch(&self, user_id: &str, project_id: &str) -> StorageResult<()> {
        sqlx::query(
            "UPDATE assembly_progress SET last_interaction = ? WHERE user_id = ? AND project_id = ?",
        )
        .bind(format_timestamp(Utc::now()))
        .bind(user_id)
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Sqlx)?;
        Ok(())
    }
}
