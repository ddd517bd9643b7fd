//! Process-scoped persisted state store.
//!
//! The auth record, circuit breaker record, and result cache outlive any one
//! page session because they represent the relationship with the remote
//! service. Each is stored as an independent JSON document under the data
//! directory; a missing document means "no state yet", never an error.
//!
//! The store is injected into the components that need it rather than
//! accessed as an ambient global, which keeps the token manager, breaker,
//! and cache independently unit-testable.

use crate::config::PipelineConfig;
use crate::error::{StoreError, StoreResult};
use crate::types::{AuthRecord, BreakerRecord, CacheSnapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

const AUTH_KEY: &str = "auth";
const BREAKER_KEY: &str = "breaker";
const CACHE_KEY: &str = "cache";

/// Key-value persistence for process-wide pipeline state.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Create a store rooted at the given directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a store rooted at the default XDG data directory.
    pub fn open_default() -> StoreResult<Self> {
        let dir = PipelineConfig::data_dir().map_err(|_| StoreError::NoDataDir)?;
        Ok(Self::new(dir))
    }

    /// Load the persisted auth record, if any.
    pub fn load_auth(&self) -> StoreResult<Option<AuthRecord>> {
        self.read(AUTH_KEY)
    }

    /// Write-through the auth record.
    pub fn save_auth(&self, record: &AuthRecord) -> StoreResult<()> {
        self.write(AUTH_KEY, record)
    }

    /// Remove the persisted auth record (force-refresh path).
    pub fn clear_auth(&self) -> StoreResult<()> {
        self.remove(AUTH_KEY)
    }

    /// Load the persisted breaker record, if any.
    pub fn load_breaker(&self) -> StoreResult<Option<BreakerRecord>> {
        self.read(BREAKER_KEY)
    }

    /// Write-through the breaker record.
    pub fn save_breaker(&self, record: &BreakerRecord) -> StoreResult<()> {
        self.write(BREAKER_KEY, record)
    }

    /// Load the persisted cache snapshot, if any.
    pub fn load_cache(&self) -> StoreResult<Option<CacheSnapshot>> {
        self.read(CACHE_KEY)
    }

    /// Write-through the cache snapshot.
    pub fn save_cache(&self, snapshot: &CacheSnapshot) -> StoreResult<()> {
        self.write(CACHE_KEY, snapshot)
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let path = self.path(key);
        if !path.exists() {
            tracing::debug!(key, "no persisted state, starting fresh");
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })?;

        let value = serde_json::from_str(&contents).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;

        Ok(Some(value))
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })?;

        let contents = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;

        tracing::debug!(key, "persisting state document");
        fs::write(self.path(key), contents).map_err(|source| StoreError::Io {
            key: key.to_string(),
            source,
        })
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|source| StoreError::Io {
                key: key.to_string(),
                source,
            })?;
            tracing::debug!(key, "removed state document");
        }
        Ok(())
    }
}
