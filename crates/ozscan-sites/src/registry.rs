//! In-memory site definition registry with hostname matching.

use crate::{
    definition::{ExtractionStrategy, SiteDefinition},
    error::{Result, SiteError},
    loader::SiteLoader,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Selector list tried on hosts with no registered definition.
pub const GENERIC_SELECTORS: &[&str] = &[
    "[itemprop='address']",
    "[data-testid='address']",
    ".address",
    "[class*='address']",
    "h1",
];

/// In-memory cache of site definitions with hostname lookup.
///
/// The registry starts from a built-in table of known listing sites and can
/// be extended or overridden from TOML files on disk. Lookups try an exact
/// hostname match first, then the longest registered parent-domain suffix.
#[derive(Clone)]
pub struct SiteRegistry {
    /// Definitions indexed by registered host
    definitions: Arc<RwLock<HashMap<String, SiteDefinition>>>,
}

impl SiteRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            definitions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a registry pre-populated with the built-in site table.
    #[must_use]
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        for definition in builtin_definitions() {
            // Built-in definitions are known valid
            let _ = registry.insert(definition);
        }
        registry
    }

    /// Merge all definitions from the given loader over the current table.
    ///
    /// Loaded definitions replace built-ins for the same host.
    pub fn merge_from(&self, loader: &SiteLoader) -> Result<()> {
        let definitions = loader.load_all()?;
        let count = definitions.len();

        let mut cache = self
            .definitions
            .write()
            .expect("acquire write lock on definitions");

        for definition in definitions {
            cache.insert(definition.host.clone(), definition);
        }

        info!(count, "merged site definitions from disk");
        Ok(())
    }

    /// Find the definition applying to a hostname.
    ///
    /// Exact host match wins; otherwise the longest registered suffix that
    /// matches as a parent domain is used.
    #[must_use]
    pub fn lookup(&self, hostname: &str) -> Option<SiteDefinition> {
        let cache = self
            .definitions
            .read()
            .expect("acquire read lock on definitions");

        if let Some(definition) = cache.get(hostname) {
            return Some(definition.clone());
        }

        cache
            .values()
            .filter(|def| def.matches_host(hostname))
            .max_by_key(|def| def.host.len())
            .cloned()
    }

    /// Get a definition by its registered host.
    pub fn get(&self, host: &str) -> Result<SiteDefinition> {
        let cache = self
            .definitions
            .read()
            .expect("acquire read lock on definitions");

        cache.get(host).cloned().ok_or_else(|| SiteError::NotFound {
            host: host.to_string(),
        })
    }

    /// Add or replace a site definition.
    pub fn insert(&self, definition: SiteDefinition) -> Result<()> {
        definition.validate()?;

        let mut cache = self
            .definitions
            .write()
            .expect("acquire write lock on definitions");

        debug!(host = %definition.host, "inserted site definition");
        cache.insert(definition.host.clone(), definition);

        Ok(())
    }

    /// Remove a definition by host. Returns `true` if it was present.
    pub fn remove(&self, host: &str) -> bool {
        let mut cache = self
            .definitions
            .write()
            .expect("acquire write lock on definitions");

        let removed = cache.remove(host).is_some();
        if removed {
            debug!(host, "removed site definition");
        }
        removed
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn count(&self) -> usize {
        let cache = self
            .definitions
            .read()
            .expect("acquire read lock on definitions");
        cache.len()
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Built-in definitions for known listing sites.
///
/// Selector strings here are a maintenance concern and change as the sites
/// redesign; the strategies are the stable part.
fn builtin_definitions() -> Vec<SiteDefinition> {
    let def = |host: &str, selectors: &[&str], strategy: ExtractionStrategy| {
        SiteDefinition::new(
            host,
            selectors.iter().map(ToString::to_string).collect(),
            strategy,
        )
    };

    vec![
        def(
            "zillow.com",
            &["h1[class*='addr']", "[data-test='bdp-building-address']"],
            ExtractionStrategy::Standard,
        ),
        def(
            "realtor.com",
            &["[data-testid='address']", "h1[class*='address']"],
            ExtractionStrategy::Standard,
        ),
        def(
            "redfin.com",
            &[".street-address", ".cityStateZip"],
            ExtractionStrategy::SplitStreetCityStateZip,
        ),
        def(
            "trulia.com",
            &["[data-testid='home-details-summary-headline']"],
            ExtractionStrategy::Standard,
        ),
        def(
            "homes.com",
            &[".property-info-address-main", ".property-info-address-citystatezip"],
            ExtractionStrategy::TwoLineAddress,
        ),
        def(
            "apartments.com",
            &["#propertyAddressRow .delivery-address span"],
            ExtractionStrategy::MultiLineJoin,
        ),
        def(
            "loopnet.com",
            &["[itemprop='address']"],
            ExtractionStrategy::StructuredItemprop,
        ),
        def(
            "crexi.com",
            &["h1[class*='property-name']", ".address-line"],
            ExtractionStrategy::Standard,
        ),
    ]
}
