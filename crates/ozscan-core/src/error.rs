//! Core error types for the OzScan pipeline.
//!
//! This module defines the central error type used across all subsystems.
//! Each subsystem error is represented as a variant for clear error propagation.

use thiserror::Error;

/// Central error type for all OzScan operations.
///
/// Each variant represents an error from a specific subsystem, allowing
/// for clear error propagation and handling across crate boundaries.
#[derive(Error, Debug)]
pub enum OzScanError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State store errors (persisted auth/breaker/cache records)
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// Address extraction errors (HTML parsing, selector failures)
    #[error("extraction error: {0}")]
    Extract(String),

    /// Site registry errors (definitions, loading)
    #[error("site registry error: {0}")]
    Sites(String),

    /// Remote lookup errors (network, auth, rate limiting)
    #[error("lookup error: {0}")]
    Lookup(String),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Config file not found (may be first run)
    #[error("config file not found at {path}")]
    NotFound {
        /// Path where config was expected
        path: String,
    },

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Errors from the persisted state store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to determine data directory path
    #[error("could not determine data directory (XDG base directories not available)")]
    NoDataDir,

    /// I/O error reading or writing a state document
    #[error("I/O error for {key}: {source}")]
    Io {
        /// State document key
        key: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Failed to encode or decode a state document
    #[error("failed to (de)serialize {key}: {source}")]
    Serde {
        /// State document key
        key: String,
        /// Underlying JSON error
        source: serde_json::Error,
    },
}

/// Result type alias using `OzScanError`.
pub type Result<T> = std::result::Result<T, OzScanError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for state store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OzScanError::Validation("not a postal address".to_string());
        assert_eq!(err.to_string(), "validation error: not a postal address");

        let err = ConfigError::NoConfigDir;
        assert_eq!(
            err.to_string(),
            "could not determine config directory (XDG base directories not available)"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let core_err: OzScanError = config_err.into();
        assert!(matches!(core_err, OzScanError::Config(_)));
    }

    #[test]
    fn test_error_from_store() {
        let store_err = StoreError::NoDataDir;
        let core_err: OzScanError = store_err.into();
        assert!(matches!(core_err, OzScanError::Store(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let core_err: OzScanError = io_err.into();
        assert!(matches!(core_err, OzScanError::Io(_)));
    }
}
