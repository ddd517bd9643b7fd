//! In-flight request de-duplication.
//!
//! Concurrent lookups for the same normalized address collapse onto one
//! network call; every waiter receives a clone of the single outcome. This
//! is why [`LookupError`](crate::error::LookupError) is `Clone`.

use crate::error::{LookupError, Result};
use ozscan_core::LookupResult;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

type Outcome = Result<LookupResult>;

/// Collapses concurrent calls that share a request key.
#[derive(Debug, Default)]
pub struct Inflight {
    slots: Mutex<HashMap<String, broadcast::Sender<Outcome>>>,
}

impl Inflight {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call` for `key`, unless a call for the same key is already in
    /// flight, in which case wait for its outcome instead.
    pub async fn run<F, Fut>(&self, key: &str, call: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let waiter = {
            let mut slots = self.slots.lock().await;
            match slots.get(key) {
                Some(leader) => Some(leader.subscribe()),
                None => {
                    let (sender, _) = broadcast::channel(1);
                    slots.insert(key.to_string(), sender);
                    None
                }
            }
        };

        if let Some(mut waiter) = waiter {
            debug!(key, "joining in-flight lookup");
            return match waiter.recv().await {
                Ok(outcome) => outcome,
                Err(_) => Err(LookupError::Unavailable(
                    "in-flight lookup was dropped".to_string(),
                )),
            };
        }

        let outcome = call().await;

        // Remove the slot before broadcasting so late arrivals start fresh
        let mut slots = self.slots.lock().await;
        if let Some(sender) = slots.remove(key) {
            let _ = sender.send(outcome.clone());
        }

        outcome
    }

    /// Number of keys currently in flight.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Whether nothing is currently in flight.
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}
