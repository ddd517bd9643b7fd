//! OzScan Result Cache
//!
//! A size-bounded, TTL-bounded key→result store keyed by normalized
//! address. Reads refresh the entry's touch timestamp (LRU by touch-time);
//! inserting at capacity evicts the entry with the oldest touch. An entry
//! older than the TTL is treated as absent and lazily purged on access.
//!
//! Only conclusive results are stored: an "address not found" outcome is
//! never cached so a corrected address can retry later. Timestamps are
//! epoch millis so the snapshot survives process restarts via the state
//! store in `ozscan-core`.
//!
//! The cache is consulted before any network call in every lookup path; a
//! hit short-circuits the entire request pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use chrono::Utc;
use ozscan_core::{CacheEntryRecord, CacheSnapshot, LookupResult, NormalizedAddress};
use std::collections::HashMap;

/// Size- and TTL-bounded result cache with LRU-by-touch eviction.
#[derive(Debug, Clone)]
pub struct ResultCache {
    entries: HashMap<String, CacheEntryRecord>,
    limit: usize,
    ttl_ms: i64,
}

impl ResultCache {
    /// Create an empty cache with the given capacity and TTL.
    #[must_use]
    pub fn new(limit: usize, ttl_ms: i64) -> Self {
        Self {
            entries: HashMap::new(),
            limit,
            ttl_ms,
        }
    }

    /// Rebuild a cache from a persisted snapshot.
    ///
    /// Entries beyond the capacity are dropped oldest-touch-first; expired
    /// entries are purged lazily on access as usual.
    #[must_use]
    pub fn from_snapshot(snapshot: CacheSnapshot, limit: usize, ttl_ms: i64) -> Self {
        let mut entries: Vec<(String, CacheEntryRecord)> = snapshot.into_iter().collect();

        if entries.len() > limit {
            entries.sort_by_key(|(_, entry)| std::cmp::Reverse(entry.touched_ms));
            entries.truncate(limit);
        }

        Self {
            entries: entries.into_iter().collect(),
            limit,
            ttl_ms,
        }
    }

    /// Export the current contents for persistence.
    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot {
        self.entries.clone()
    }

    /// Look up a result, treating entries older than the TTL as absent.
    ///
    /// A hit refreshes the entry's touch timestamp.
    pub fn get(&mut self, key: &NormalizedAddress) -> Option<LookupResult> {
        self.get_at(key, Utc::now().timestamp_millis())
    }

    /// [`get`](Self::get) with an explicit clock, for deterministic tests.
    pub fn get_at(&mut self, key: &NormalizedAddress, now_ms: i64) -> Option<LookupResult> {
        match self.entries.get_mut(key.as_str()) {
            None => None,
            Some(entry) => {
                if now_ms - entry.touched_ms > self.ttl_ms {
                    tracing::debug!(key = %key, "purging expired cache entry");
                    self.entries.remove(key.as_str());
                    return None;
                }
                entry.touched_ms = now_ms;
                Some(entry.value.clone())
            }
        }
    }

    /// Insert a result, evicting the oldest-touch entry at capacity.
    ///
    /// Inconclusive ("address not found") results are not stored.
    pub fn put(&mut self, key: &NormalizedAddress, value: LookupResult) {
        self.put_at(key, value, Utc::now().timestamp_millis());
    }

    /// [`put`](Self::put) with an explicit clock, for deterministic tests.
    pub fn put_at(&mut self, key: &NormalizedAddress, value: LookupResult, now_ms: i64) {
        if !value.is_cacheable() {
            tracing::debug!(key = %key, "not caching inconclusive result");
            return;
        }

        if !self.entries.contains_key(key.as_str()) && self.entries.len() >= self.limit {
            self.evict_oldest();
        }

        self.entries.insert(
            key.as_str().to_string(),
            CacheEntryRecord {
                value,
                touched_ms: now_ms,
            },
        );
    }

    /// Number of entries currently stored (including not-yet-purged expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether a key is currently present (ignores TTL; used by tests and
    /// eviction diagnostics).
    #[must_use]
    pub fn contains(&self, key: &NormalizedAddress) -> bool {
        self.entries.contains_key(key.as_str())
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.touched_ms)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            tracing::debug!(key = %key, "evicting least-recently-touched cache entry");
            self.entries.remove(&key);
        }
    }
}
