//! On-disk cache of the filtered system list.
//!
//! One JSON file per cache key under the cache directory. Cache problems
//! are logged and treated as a miss; they never fail an inventory run.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Directory used when no cache connection is configured, relative to home.
const DEFAULT_CACHE_DIR: &str = ".ansible/tmp/ansible_mlm_inventory";

#[derive(Debug, Serialize, Deserialize)]
struct CachedSystems {
    created_at: u64,
    systems: Vec<Map<String, Value>>,
}

/// A directory of cached system lists with an expiry.
#[derive(Debug, Clone)]
pub struct SystemCache {
    dir: PathBuf,
    timeout: Duration,
}

impl SystemCache {
    /// A cache in `dir`. A zero timeout never expires.
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    /// `~/.ansible/tmp/ansible_mlm_inventory`, if there is a home directory.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_CACHE_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached systems for `key`, if present and fresh. An empty list counts
    /// as a miss.
    pub fn load(&self, key: &str) -> Option<Vec<Map<String, Value>>> {
        let path = self.path_for(key);
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Inventory cache miss");
                return None;
            }
        };

        let cached: CachedSystems = match serde_json::from_slice(&content) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable inventory cache");
                return None;
            }
        };

        if self.is_expired(cached.created_at) {
            debug!(path = %path.display(), "Inventory cache expired");
            return None;
        }
        if cached.systems.is_empty() {
            return None;
        }

        debug!(path = %path.display(), count = cached.systems.len(), "Inventory cache hit");
        Some(cached.systems)
    }

    /// Store systems under `key`. Failures are logged.
    pub fn store(&self, key: &str, systems: &[Map<String, Value>]) {
        let path = self.path_for(key);
        let cached = CachedSystems {
            created_at: now_secs(),
            systems: systems.to_vec(),
        };

        let result = std::fs::create_dir_all(&self.dir)
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_vec(&cached).map_err(|e| e.to_string()))
            .and_then(|data| std::fs::write(&path, data).map_err(|e| e.to_string()));

        match result {
            Ok(()) => debug!(path = %path.display(), count = systems.len(), "Inventory cache written"),
            Err(e) => warn!(path = %path.display(), error = %e, "Could not write inventory cache"),
        }
    }

    fn is_expired(&self, created_at: u64) -> bool {
        if self.timeout.is_zero() {
            return false;
        }
        now_secs().saturating_sub(created_at) >= self.timeout.as_secs()
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
            .collect();
        self.dir.join(file)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
