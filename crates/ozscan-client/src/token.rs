//! Bearer-token lifecycle management.
//!
//! Tokens come from `POST /temporary-key`, carry a server-reported expiry
//! and usage limit, and persist across sessions through the state store.
//! A cached token is reused while it has headroom before expiry; otherwise
//! a fresh key is issued and replaces the persisted record, counters
//! reset. The usage limit is the server's to enforce: exhaustion comes
//! back as a 429, never as a reason to mint a new key here.

use crate::api::OzClient;
use crate::error::Result;
use chrono::{Duration, Utc};
use ozscan_core::{AuthRecord, StateStore};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Issues, caches, and persists bearer tokens for the lookup service.
pub struct TokenManager {
    client: OzClient,
    store: StateStore,
    skew: Duration,
    current: Mutex<Option<AuthRecord>>,
}

impl TokenManager {
    /// Create a manager backed by the given client and store.
    ///
    /// Loads any persisted record eagerly; a corrupt or unreadable record
    /// is discarded, not fatal.
    #[must_use]
    pub fn new(client: OzClient, store: StateStore, expiry_skew_secs: i64) -> Self {
        let persisted = match store.load_auth() {
            Ok(record) => record,
            Err(error) => {
                warn!(%error, "discarding unreadable auth record");
                None
            }
        };

        Self {
            client,
            store,
            skew: Duration::seconds(expiry_skew_secs),
            current: Mutex::new(persisted),
        }
    }

    /// Get a usable bearer token, issuing a fresh one when needed.
    ///
    /// The cached token is reused while `now < expires_at - skew`; only
    /// expiry or absence triggers issuance. An exhausted usage count does
    /// not: the server signals that with a 429 on the lookup itself.
    pub async fn get_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        if let Some(record) = current.as_ref() {
            if record.valid_at(Utc::now(), self.skew) {
                return Ok(record.token.clone());
            }
            debug!("cached token expired");
        }

        let record = self.issue(&mut current).await?;
        Ok(record.token)
    }

    /// Discard the current token unconditionally and issue a fresh one.
    ///
    /// Used when the service rejects a token the client still thought was
    /// valid.
    pub async fn force_refresh(&self) -> Result<String> {
        let mut current = self.current.lock().await;

        *current = None;
        if let Err(error) = self.store.clear_auth() {
            warn!(%error, "failed to clear persisted auth record");
        }

        let record = self.issue(&mut current).await?;
        Ok(record.token)
    }

    /// Record one consumed lookup against the current token.
    ///
    /// Cache hits never reach this; only completed remote lookups count
    /// against the server-enforced limit.
    pub async fn record_use(&self) {
        let mut current = self.current.lock().await;

        if let Some(record) = current.as_mut() {
            record.used_count = record.used_count.saturating_add(1);
            if let Err(error) = self.store.save_auth(record) {
                warn!(%error, "failed to persist token usage count");
            }
        }
    }

    /// Snapshot of the current token state, if any.
    pub async fn status(&self) -> Option<AuthRecord> {
        self.current.lock().await.clone()
    }

    /// Issue a fresh key, replacing the cached and persisted record.
    ///
    /// The lock is held across the call so concurrent callers cannot race
    /// two issuances.
    async fn issue(&self, current: &mut Option<AuthRecord>) -> Result<AuthRecord> {
        let key = self.client.issue_key().await?;
        info!(
            usage_limit = key.usage_limit,
            is_registered = key.is_registered,
            "issued fresh bearer token"
        );

        let record = AuthRecord {
            token: key.token,
            expires_at: key.expires_at,
            usage_limit: key.usage_limit,
            used_count: 0,
            is_registered: key.is_registered,
        };

        if let Err(error) = self.store.save_auth(&record) {
            warn!(%error, "failed to persist fresh auth record");
        }
        *current = Some(record.clone());
        Ok(record)
    }
}
