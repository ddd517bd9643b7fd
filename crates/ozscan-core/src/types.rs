//! Shared types used across the OzScan pipeline.
//!
//! This module defines the domain types exchanged between the extractor,
//! cache, breaker, client, and pipeline crates, plus the persisted record
//! forms written by the state store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Canonical cache/deduplication key for a street address.
///
/// Normalization is lower-casing, punctuation stripping, and whitespace
/// collapsing. It is idempotent: normalizing a normalized key yields the
/// same key, and two raw strings differing only in case, whitespace, or
/// punctuation normalize identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedAddress(String);

impl NormalizedAddress {
    /// Normalize a raw address string into a canonical key.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let mut cleaned = String::with_capacity(raw.len());
        for ch in raw.chars() {
            if ch.is_alphanumeric() {
                for lower in ch.to_lowercase() {
                    cleaned.push(lower);
                }
            } else {
                // Punctuation and whitespace both become separators
                cleaned.push(' ');
            }
        }

        let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        Self(collapsed)
    }

    /// Get the inner key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of an Opportunity Zone lookup, as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    /// Whether the address falls inside a designated Opportunity Zone
    pub is_in_opportunity_zone: bool,

    /// Census tract identifier of the zone, when inside one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opportunity_zone_id: Option<String>,

    /// Set when the service could not geocode the address at all.
    /// Inconclusive results like this are never cached so a corrected
    /// address can retry.
    #[serde(default)]
    pub address_not_found: bool,

    /// Additional service metadata, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl LookupResult {
    /// Whether this result is conclusive enough to cache.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        !self.address_not_found
    }
}

/// Persisted bearer-token record issued by `POST /temporary-key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRecord {
    /// Short-lived bearer token
    pub token: String,

    /// Expiry instant reported by the server
    pub expires_at: DateTime<Utc>,

    /// Number of lookups the token is good for
    pub usage_limit: u32,

    /// Lookups consumed so far (cache hits never count)
    pub used_count: u32,

    /// Whether the key belongs to a registered account
    #[serde(default)]
    pub is_registered: bool,
}

impl AuthRecord {
    /// Whether the token is still usable at `now`, leaving `skew` headroom
    /// before the reported expiry.
    #[must_use]
    pub fn valid_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now < self.expires_at - skew
    }

    /// Lookups remaining before the server-enforced limit.
    #[must_use]
    pub fn remaining_uses(&self) -> u32 {
        self.usage_limit.saturating_sub(self.used_count)
    }
}

/// Circuit breaker state machine positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BreakerStateKind {
    /// Calls flow through normally
    #[default]
    Closed,
    /// Calls are short-circuited until the next attempt deadline
    Open,
    /// Deadline has passed; a probe call is allowed through
    HalfOpen,
}

/// Persisted form of the circuit breaker state.
///
/// The breaker is process-wide (it tracks the relationship with the remote
/// service, not any one page), so it survives page sessions via the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BreakerRecord {
    /// Consecutive failure count
    pub failures: u32,

    /// Epoch millis of the most recent failure
    pub last_failure_ms: Option<i64>,

    /// Current state machine position
    pub state: BreakerStateKind,

    /// Epoch millis before which calls are short-circuited while open
    pub next_attempt_ms: Option<i64>,
}

/// One persisted cache entry: the lookup value plus its last-touch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntryRecord {
    /// Cached lookup result
    pub value: LookupResult,

    /// Epoch millis of the last read or write (LRU by touch-time)
    pub touched_ms: i64,
}

/// Persisted form of the whole result cache, keyed by normalized address.
pub type CacheSnapshot = HashMap<String, CacheEntryRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_is_idempotent() {
        let once = NormalizedAddress::new("123 Main St, Miami, FL 33125");
        let twice = NormalizedAddress::new(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalization_collapses_case_whitespace_punctuation() {
        let a = NormalizedAddress::new("123 Main St, Miami, FL 33125");
        let b = NormalizedAddress::new("123  main st,miami,fl 33125");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "123 main st miami fl 33125");
    }

    #[test]
    fn test_normalization_strips_unit_punctuation() {
        let key = NormalizedAddress::new("500 Brickell Ave., #1203, Miami, FL 33131");
        assert_eq!(key.as_str(), "500 brickell ave 1203 miami fl 33131");
    }

    #[test]
    fn test_lookup_result_wire_shape() {
        let json = r#"{"isInOpportunityZone":true,"opportunityZoneId":"12086003700"}"#;
        let result: LookupResult = serde_json::from_str(json).expect("parse lookup result");
        assert!(result.is_in_opportunity_zone);
        assert_eq!(result.opportunity_zone_id.as_deref(), Some("12086003700"));
        assert!(!result.address_not_found);
        assert!(result.is_cacheable());
    }

    #[test]
    fn test_address_not_found_is_not_cacheable() {
        let json = r#"{"isInOpportunityZone":false,"addressNotFound":true}"#;
        let result: LookupResult = serde_json::from_str(json).expect("parse lookup result");
        assert!(!result.is_cacheable());
    }

    #[test]
    fn test_auth_record_validity_window() {
        let now = Utc::now();
        let record = AuthRecord {
            token: "tok".to_string(),
            expires_at: now + Duration::seconds(120),
            usage_limit: 10,
            used_count: 3,
            is_registered: false,
        };

        assert!(record.valid_at(now, Duration::seconds(60)));
        // Inside the skew window the token is treated as expired
        assert!(!record.valid_at(now + Duration::seconds(61), Duration::seconds(60)));
        assert_eq!(record.remaining_uses(), 7);
    }

    #[test]
    fn test_breaker_record_default_is_closed() {
        let record = BreakerRecord::default();
        assert_eq!(record.state, BreakerStateKind::Closed);
        assert_eq!(record.failures, 0);
        assert!(record.next_attempt_ms.is_none());
    }
}
