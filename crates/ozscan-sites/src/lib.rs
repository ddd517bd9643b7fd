//! OzScan Sites - Selector registry for known real-estate listing sites.
//!
//! This crate holds the typed table mapping hostnames (and hostname
//! suffixes) to CSS selector lists plus a named extraction strategy. The
//! selector strings themselves are a maintenance concern; the strategy
//! dispatch lives in `ozscan-extract`.
//!
//! # Modules
//!
//! - [`definition`] - `SiteDefinition` and the closed `ExtractionStrategy` enum
//! - [`registry`] - In-memory registry with exact and suffix hostname matching
//! - [`loader`] - TOML override loading from a definitions directory
//! - [`error`] - Crate error types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod loader;
pub mod registry;

// Re-export commonly used types
pub use definition::{ExtractionStrategy, SiteDefinition};
pub use error::{Result, SiteError};
pub use loader::SiteLoader;
pub use registry::{SiteRegistry, GENERIC_SELECTORS};
