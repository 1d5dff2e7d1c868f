// ABOUTME: Per-installation client identity persisted as JSON
// ABOUTME: Random user id, active project and project-scoped cached data

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use droneguide_core::{generate_user_id, identity_file};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Corrupt identity file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub active_project_id: Option<String>,
    /// Cached client data keyed by project id
    #[serde(default)]
    pub project_cache: HashMap<String, Value>,
}

impl Identity {
    fn fresh() -> Self {
        Self {
            user_id: generate_user_id(),
            active_project_id: None,
            project_cache: HashMap::new(),
        }
    }
}

/// File-backed identity. Every mutation is written through immediately.
#[derive(Debug)]
pub struct IdentityStore {
    path: PathBuf,
    identity: Identity,
}

impl IdentityStore {
    /// Open the default location (~/.droneguide/client.json)
    pub fn open_default() -> Result<Self, IdentityError> {
        Self::open(identity_file())
    }

    /// Load the identity at `path`, creating one if the file is missing or unreadable
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IdentityError> {
        let path = path.into();
        let identity = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Identity>(&text) {
                Ok(identity) if !identity.user_id.trim().is_empty() => identity,
                Ok(_) => {
                    warn!(path = %path.display(), "Identity file has no user id, regenerating");
                    Identity::fresh()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Identity file unreadable, regenerating");
                    Identity::fresh()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Creating new client identity");
                Identity::fresh()
            }
            Err(e) => return Err(e.into()),
        };

        let store = Self { path, identity };
        store.save()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }

    pub fn active_project(&self) -> Option<&str> {
        self.identity.active_project_id.as_deref()
    }

    /// Switch the active project, dropping cached data of the previous one
    pub fn set_active_project(&mut self, project_id: &str) -> Result<(), IdentityError> {
        if let Some(previous) = self.identity.active_project_id.take() {
            if previous != project_id && self.identity.project_cache.remove(&previous).is_some() {
                debug!(project_id = %previous, "Cleared cached data of previous project");
            }
        }
        self.identity.active_project_id = Some(project_id.to_string());
        self.save()
    }

    pub fn cached(&self, project_id: &str) -> Option<&Value> {
        self.identity.project_cache.get(project_id)
    }

    pub fn cache(&mut self, project_id: &str, data: Value) -> Result<(), IdentityError> {
        self.identity
            .project_cache
            .insert(project_id.to_string(), data);
        self.save()
    }

    fn save(&self) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.identity)?;
        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_identity_is_stable_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("client.json");

        let first = IdentityStore::open(&path).unwrap();
        assert!(first.user_id().starts_with("user_"));

        let second = IdentityStore::open(&path).unwrap();
        assert_eq!(first.user_id(), second.user_id());
    }

    #[test]
    fn test_switching_project_clears_previous_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.json");
        let mut store = IdentityStore::open(&path).unwrap();

        store.set_active_project("p1").unwrap();
        store.cache("p1", json!({"step": 2})).unwrap();
        store.cache("p2", json!({"step": 5})).unwrap();

        store.set_active_project("p1").unwrap();
        assert!(store.cached("p1").is_some());

        store.set_active_project("p2").unwrap();
        assert!(store.cached("p1").is_none());
        assert_eq!(store.cached("p2"), Some(&json!({"step": 5})));

        let reopened = IdentityStore::open(&path).unwrap();
        assert_eq!(reopened.active_project(), Some("p2"));
        assert!(reopened.cached("p1").is_none());
    }

    #[test]
    fn test_corrupt_file_is_regenerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, "not json").unwrap();

        let store = IdentityStore::open(&path).unwrap();
        assert!(store.user_id().starts_with("user_"));
    }
}
