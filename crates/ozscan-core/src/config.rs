//! Configuration management for the OzScan pipeline.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main pipeline configuration.
///
/// This is loaded from `~/.config/ozscan/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Remote API settings
    pub api: ApiConfig,
    /// Page scanning settings
    pub scan: ScanConfig,
    /// Lookup queue settings
    pub queue: QueueConfig,
    /// Result cache settings
    pub cache: CacheConfig,
    /// Circuit breaker settings
    pub breaker: BreakerConfig,
    /// Token manager settings
    pub auth: AuthConfig,
}

impl PipelineConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `OZSCAN_API_BASE_URL`: Override the remote API base URL
    /// - `OZSCAN_MAX_CHECKS_PER_PAGE`: Override the per-page lookup quota
    /// - `OZSCAN_LISTING_ADDRESS_FALLBACK`: Override the listing-address fallback flag (true/false)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("OZSCAN_API_BASE_URL") {
            if !val.is_empty() {
                tracing::debug!("Override api.base_url from env: {}", val);
                config.api.base_url = val;
            }
        }

        if let Ok(val) = std::env::var("OZSCAN_MAX_CHECKS_PER_PAGE") {
            if let Ok(quota) = val.parse() {
                config.scan.max_checks_per_page = quota;
                tracing::debug!("Override scan.max_checks_per_page from env: {}", quota);
            }
        }

        if let Ok(val) = std::env::var("OZSCAN_LISTING_ADDRESS_FALLBACK") {
            if let Ok(enabled) = val.parse() {
                config.api.use_listing_address_fallback = enabled;
                tracing::debug!("Override api.use_listing_address_fallback from env: {}", enabled);
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/ozscan/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("io", "ozscan", "ozscan").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/ozscan`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("io", "ozscan", "ozscan").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the Opportunity Zone lookup service
    pub base_url: String,
    /// Value sent in the extension-version identifying header
    pub client_version: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Whether the explicit flow may call `POST /listing-address` to resolve
    /// an address from the listing URL
    pub use_listing_address_fallback: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.ozscan.io".to_string(),
            client_version: format!("ozscan/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            use_listing_address_fallback: false,
        }
    }
}

/// Page scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Debounce interval for repeated scan triggers in milliseconds
    pub debounce_ms: u64,
    /// Hard per-page lookup quota; reset only by an explicit manual scan
    pub max_checks_per_page: u32,
    /// Text nodes longer than this are skipped by the visible-text strategy
    pub text_node_ceiling: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            max_checks_per_page: 25,
            text_node_ceiling: 300,
        }
    }
}

/// Lookup queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Fixed delay between successful dequeues in milliseconds
    pub inter_request_delay_ms: u64,
    /// Pause applied to the whole queue after a rate-limit signal, in milliseconds
    pub rate_limit_backoff_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inter_request_delay_ms: 1500,
            rate_limit_backoff_ms: 60_000,
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results
    pub limit: usize,
    /// Entry time-to-live in milliseconds
    pub ttl_ms: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            ttl_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens
    pub failure_threshold: u32,
    /// Base cooldown once open, in milliseconds
    pub reset_timeout_ms: i64,
    /// Exponential growth factor for repeated failures past the threshold
    pub backoff_multiplier: u32,
    /// Cap on the computed cooldown, in milliseconds
    pub max_backoff_ms: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 30_000,
            backoff_multiplier: 2,
            max_backoff_ms: 300_000,
        }
    }
}

/// Token manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Safety skew subtracted from the token expiry, in seconds
    pub expiry_skew_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            expiry_skew_secs: 60,
        }
    }
}
