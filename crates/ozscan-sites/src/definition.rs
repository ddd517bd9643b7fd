//! Site definition types and structures.
//!
//! A site definition pairs a hostname (or hostname suffix) with the CSS
//! selectors that locate address elements on that site and the strategy
//! used to assemble an address string from the matched elements.

use crate::error::{Result, SiteError};
use serde::{Deserialize, Serialize};

/// How matched elements are turned into an address string.
///
/// This is a closed enum rather than a string-keyed function lookup so a
/// definition can never name a strategy the extractor does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionStrategy {
    /// Trimmed text content of each matched element
    #[default]
    Standard,
    /// Assemble street/city/state/zip from `itemprop` children of the match
    StructuredItemprop,
    /// Assemble from two sibling fields: street line and city-state-zip line
    SplitStreetCityStateZip,
    /// Concatenate two adjacent line fields, stripping a breadcrumb prefix
    /// when the first line carries one
    TwoLineAddress,
    /// Concatenate the text of all matching address-line children
    MultiLineJoin,
}

impl ExtractionStrategy {
    /// Get a human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::StructuredItemprop => "Structured itemprop",
            Self::SplitStreetCityStateZip => "Split street / city-state-zip",
            Self::TwoLineAddress => "Two-line address",
            Self::MultiLineJoin => "Multi-line join",
        }
    }
}

/// Selector configuration for one listing site (or site family).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDefinition {
    /// Hostname or hostname suffix this definition applies to
    /// (e.g. `zillow.com` also matches `www.zillow.com`)
    pub host: String,

    /// CSS selectors tried in order against the document
    pub selectors: Vec<String>,

    /// Strategy for assembling an address from matched elements
    #[serde(default)]
    pub strategy: ExtractionStrategy,
}

impl SiteDefinition {
    /// Create a definition from parts.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        selectors: Vec<String>,
        strategy: ExtractionStrategy,
    ) -> Self {
        Self {
            host: host.into(),
            selectors,
            strategy,
        }
    }

    /// Whether this definition applies to the given hostname, either
    /// exactly or as a parent-domain suffix.
    #[must_use]
    pub fn matches_host(&self, hostname: &str) -> bool {
        hostname == self.host || hostname.ends_with(&format!(".{}", self.host))
    }

    /// Validate the definition for completeness and correctness.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(SiteError::ValidationError {
                host: self.host.clone(),
                reason: "host cannot be empty".to_string(),
            });
        }

        if self.host.contains("://") || self.host.contains('/') {
            return Err(SiteError::ValidationError {
                host: self.host.clone(),
                reason: "host must be a bare hostname, not a URL".to_string(),
            });
        }

        if self.selectors.is_empty() {
            return Err(SiteError::ValidationError {
                host: self.host.clone(),
                reason: "selector list cannot be empty".to_string(),
            });
        }

        if self.selectors.iter().any(String::is_empty) {
            return Err(SiteError::ValidationError {
                host: self.host.clone(),
                reason: "selectors cannot be empty strings".to_string(),
            });
        }

        Ok(())
    }
}
