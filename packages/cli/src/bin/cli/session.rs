// ABOUTME: Per-invocation client state for CLI commands
// ABOUTME: API client, persisted identity and channel locks

use droneguide_client::{ApiClient, ChannelLocks, IdentityStore};

pub struct Session {
    pub api: ApiClient,
    pub identity: IdentityStore,
    pub locks: ChannelLocks,
}

impl Session {
    pub fn open(api_url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            api: ApiClient::new(api_url)?,
            identity: IdentityStore::open_default()?,
            locks: ChannelLocks::open_default()?,
        })
    }

    pub fn user_id(&self) -> &str {
        self.identity.user_id()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.identity.active_project()
    }
}
