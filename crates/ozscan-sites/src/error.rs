//! Error types for the site registry.

use thiserror::Error;

/// Errors that can occur loading or querying site definitions.
#[derive(Error, Debug)]
pub enum SiteError {
    /// Definitions directory does not exist
    #[error("definitions directory not found: {path}")]
    DirectoryNotFound {
        /// Path that was checked
        path: String,
    },

    /// No definition registered for a host
    #[error("no site definition for host: {host}")]
    NotFound {
        /// Hostname that was queried
        host: String,
    },

    /// Failed to read a definition file
    #[error("failed to load site definition from {path}: {source}")]
    LoadError {
        /// File path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Failed to parse a definition file
    #[error("failed to parse site definition at {path}: {source}")]
    ParseError {
        /// File path
        path: String,
        /// Underlying TOML error
        source: toml::de::Error,
    },

    /// Definition failed validation
    #[error("invalid site definition for {host}: {reason}")]
    ValidationError {
        /// Hostname of the offending definition
        host: String,
        /// Reason for invalidity
        reason: String,
    },

    /// I/O error walking the definitions directory
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for site registry operations.
pub type Result<T> = std::result::Result<T, SiteError>;
