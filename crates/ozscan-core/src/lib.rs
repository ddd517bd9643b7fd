//! OzScan Core - Foundation crate for the OzScan lookup pipeline.
//!
//! This crate provides shared types, error handling, configuration management,
//! and the persisted state store that all other OzScan crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared domain types (`NormalizedAddress`, `LookupResult`, persisted records)
//! - [`store`] - Process-scoped key-value persistence for auth, breaker, and cache state
//!
//! # Example
//!
//! ```rust
//! use ozscan_core::{NormalizedAddress, PipelineConfig};
//!
//! let config = PipelineConfig::default();
//! let key = NormalizedAddress::new("123  Main St., Miami, FL 33125");
//! assert_eq!(key.as_str(), "123 main st miami fl 33125");
//! assert!(config.cache.limit > 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{
    ApiConfig, AuthConfig, BreakerConfig, CacheConfig, PipelineConfig, QueueConfig, ScanConfig,
};
pub use error::{ConfigError, ConfigResult, OzScanError, Result, StoreError, StoreResult};
pub use store::StateStore;
pub use types::{
    AuthRecord, BreakerRecord, BreakerStateKind, CacheEntryRecord, CacheSnapshot, LookupResult,
    NormalizedAddress,
};
