// ABOUTME: Short-lived cache for model responses keyed by project and image fingerprint
// ABOUTME: Lazy expiry on lookup, scope invalidation and a periodic background sweep

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use droneguide_core::fingerprint;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

const ANONYMOUS_USER: &str = "anon";
const NO_PROJECT: &str = "noproj";

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(5_000),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// The (user, project) pair a cached response belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectScope {
    user_id: String,
    project_id: String,
}

impl ProjectScope {
    /// Missing or blank ids fall back to shared anonymous buckets
    pub fn new(user_id: Option<&str>, project_id: Option<&str>) -> Self {
        let pick = |value: Option<&str>, fallback: &str| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            user_id: pick(user_id, ANONYMOUS_USER),
            project_id: pick(project_id, NO_PROJECT),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

impl fmt::Display for ProjectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.user_id, self.project_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    scope: ProjectScope,
    kind: &'static str,
    fingerprint: String,
}

impl CacheKey {
    pub fn new(scope: ProjectScope, kind: &'static str, fingerprint: impl Into<String>) -> Self {
        Self {
            scope,
            kind,
            fingerprint: fingerprint.into(),
        }
    }

    /// Key for a response derived from an image payload
    pub fn for_image(scope: ProjectScope, kind: &'static str, image: &str) -> Self {
        Self::new(scope, kind, fingerprint(image))
    }

    pub fn scope(&self) -> &ProjectScope {
        &self.scope
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.scope, self.kind, self.fingerprint)
    }
}

#[derive(Debug)]
struct Entry<V> {
    data: V,
    stored_at: Instant,
}

type Entries<V> = Arc<Mutex<HashMap<CacheKey, Entry<V>>>>;

/// In-memory TTL cache. Clones share the same entries.
#[derive(Debug)]
pub struct ResponseCache<V = serde_json::Value> {
    entries: Entries<V>,
    config: CacheConfig,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            config: self.config,
        }
    }
}

impl<V: Clone + Send + 'static> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn lock<V>(entries: &Mutex<HashMap<CacheKey, Entry<V>>>) -> MutexGuard<'_, HashMap<CacheKey, Entry<V>>> {
    // A panic while holding the lock cannot leave an entry half-written
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn sweep_entries<V>(entries: &Mutex<HashMap<CacheKey, Entry<V>>>, ttl: Duration) -> usize {
    let now = Instant::now();
    let mut map = lock(entries);
    let before = map.len();
    map.retain(|_, entry| now.duration_since(entry.stored_at) < ttl);
    before - map.len()
}

impl<V: Clone + Send + 'static> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Return the cached value if it is younger than the TTL. Expired hits are dropped.
    pub fn lookup(&self, key: &CacheKey) -> Option<V> {
        let mut map = lock(&self.entries);
        let fresh = match map.get(key) {
            Some(entry) => entry.stored_at.elapsed() < self.config.ttl,
            None => return None,
        };

        if fresh {
            debug!(key = %key, "Cache hit");
            map.get(key).map(|entry| entry.data.clone())
        } else {
            debug!(key = %key, "Cache entry expired");
            map.remove(key);
            None
        }
    }

    pub fn store(&self, key: CacheKey, data: V) {
        lock(&self.entries).insert(
            key,
            Entry {
                data,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop every entry of a scope, returning how many were removed
    pub fn invalidate(&self, scope: &ProjectScope) -> usize {
        let mut map = lock(&self.entries);
        let before = map.len();
        map.retain(|key, _| key.scope() != scope);
        let removed = before - map.len();
        if removed > 0 {
            debug!(scope = %scope, removed, "Invalidated cached responses");
        }
        removed
    }

    /// Drop all expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        sweep_entries(&self.entries, self.config.ttl)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic sweep. The task ends once every handle to the cache is dropped.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let entries: Weak<Mutex<HashMap<CacheKey, Entry<V>>>> = Arc::downgrade(&self.entries);
        let CacheConfig {
            ttl,
            sweep_interval,
        } = self.config;

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(Instant::now() + sweep_interval, sweep_interval);

            loop {
                interval.tick().await;

                let Some(entries) = entries.upgrade() else {
                    debug!("Response cache dropped, stopping sweeper");
                    break;
                };

                let removed = sweep_entries(&entries, ttl);
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        })
    }
}
