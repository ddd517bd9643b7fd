//! Typed message surface for the pipeline.
//!
//! The orchestrator runs as a single task consuming [`Message`]s from a
//! channel; each message variant has exactly one handler arm. Replies
//! travel over `oneshot` channels, and every request from the
//! [`PipelineHandle`] side is raced against a timeout: the first
//! resolution wins, the latecomer is discarded, and the timer's default
//! is "absent" (`None`).

use ozscan_core::{AuthRecord, LookupResult};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Result of a passive page scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Validated candidates the extractor produced
    pub candidates: usize,
    /// How many were newly enqueued (not already seen this session)
    pub enqueued: usize,
    /// Completed lookups, cache hits included, in processing order
    pub results: Vec<AddressResult>,
    /// Addresses skipped because of per-address failures
    pub skipped: usize,
    /// Whether a rate limit paused the queue during the drain
    pub rate_limited: bool,
    /// Whether the page quota stopped the drain
    pub quota_exhausted: bool,
}

/// One completed lookup within a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressResult {
    /// Address as extracted from the page
    pub address: String,
    /// Lookup outcome
    pub result: LookupResult,
}

/// Outcome of the explicit flow's detection chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectOutcome {
    /// First stage that yielded a plausible address
    Found(String),
    /// Every stage came up empty
    NotFound,
    /// A rate limit aborted the chain; prompt the upgrade path
    OverLimit,
}

/// Outcome of a confirmed explicit lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplicitOutcome {
    /// The lookup completed (cache hit or fresh)
    Result(LookupResult),
    /// Rate limited; prompt the upgrade path instead of retrying
    OverLimit,
    /// Service unavailable, try again later
    Unavailable,
}

/// Outcome of an address edit (server-side re-normalization).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Canonical form to re-confirm
    Renormalized(String),
    /// Rate limited; prompt the upgrade path
    OverLimit,
    /// Service unavailable; the edit stands as typed
    Unavailable,
}

/// Requests the orchestrator task consumes. One handler per variant.
#[derive(Debug)]
pub enum Message {
    /// Passive scan of a page; `manual` resets quota and seen-set first.
    ScanPage {
        /// Raw page HTML
        html: String,
        /// Page URL
        url: String,
        /// Whether the user explicitly requested this scan
        manual: bool,
        /// Reply channel
        reply: oneshot::Sender<ScanReport>,
    },

    /// Run the explicit flow's detection chain for one address.
    DetectAddress {
        /// Raw page HTML
        html: String,
        /// Page URL
        url: String,
        /// The user's current text selection, if any
        selection: Option<String>,
        /// Manually entered text, if the user typed one
        manual_entry: Option<String>,
        /// Reply channel
        reply: oneshot::Sender<DetectOutcome>,
    },

    /// Look up a user-confirmed address.
    CheckAddress {
        /// Confirmed address text
        address: String,
        /// Reply channel
        reply: oneshot::Sender<ExplicitOutcome>,
    },

    /// Re-normalize a user-edited address before re-confirmation.
    EditAddress {
        /// Edited address text
        address: String,
        /// Reply channel
        reply: oneshot::Sender<EditOutcome>,
    },

    /// Report the current token state.
    AuthStatus {
        /// Reply channel
        reply: oneshot::Sender<Option<AuthRecord>>,
    },

    /// Discard the current token and issue a fresh one. No reply.
    ForceTokenRefresh,
}

/// Caller-side handle over the orchestrator's channel.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<Message>,
    reply_timeout: Duration,
}

impl PipelineHandle {
    /// Wrap a sender with the given reply timeout.
    #[must_use]
    pub fn new(tx: mpsc::Sender<Message>, reply_timeout: Duration) -> Self {
        Self { tx, reply_timeout }
    }

    /// Trigger a passive scan. `None` on timeout.
    pub async fn scan_page(&self, html: String, url: String, manual: bool) -> Option<ScanReport> {
        self.ask(|reply| Message::ScanPage {
            html,
            url,
            manual,
            reply,
        })
        .await
    }

    /// Run the detection chain. `None` on timeout.
    pub async fn detect_address(
        &self,
        html: String,
        url: String,
        selection: Option<String>,
        manual_entry: Option<String>,
    ) -> Option<DetectOutcome> {
        self.ask(|reply| Message::DetectAddress {
            html,
            url,
            selection,
            manual_entry,
            reply,
        })
        .await
    }

    /// Look up a confirmed address. `None` on timeout.
    pub async fn check_address(&self, address: String) -> Option<ExplicitOutcome> {
        self.ask(|reply| Message::CheckAddress { address, reply })
            .await
    }

    /// Re-normalize an edited address. `None` on timeout.
    pub async fn edit_address(&self, address: String) -> Option<EditOutcome> {
        self.ask(|reply| Message::EditAddress { address, reply })
            .await
    }

    /// Current token state. `None` on timeout or when no token exists.
    pub async fn auth_status(&self) -> Option<AuthRecord> {
        self.ask(|reply| Message::AuthStatus { reply })
            .await
            .flatten()
    }

    /// Fire-and-forget token refresh.
    pub async fn force_token_refresh(&self) {
        let _ = self.tx.send(Message::ForceTokenRefresh).await;
    }

    /// Send a request and race the reply against the timeout.
    ///
    /// First resolution wins; a reply arriving after the timer is dropped
    /// with the receiver.
    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Message) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(make(reply_tx)).await.is_err() {
            debug!("pipeline task is gone, reporting absent");
            return None;
        }

        tokio::select! {
            outcome = reply_rx => outcome.ok(),
            () = tokio::time::sleep(self.reply_timeout) => {
                debug!("reply timed out, reporting absent");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_absent_and_discards_late_reply() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = PipelineHandle::new(tx, Duration::from_millis(100));

        // A handler that replies far too late
        tokio::spawn(async move {
            let Some(Message::AuthStatus { reply }) = rx.recv().await else {
                panic!("expected auth status request");
            };
            tokio::time::sleep(Duration::from_secs(5)).await;
            let _ = reply.send(None);
        });

        assert!(handle.auth_status().await.is_none());
    }

    #[tokio::test]
    async fn test_prompt_reply_wins() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = PipelineHandle::new(tx, Duration::from_secs(10));

        tokio::spawn(async move {
            let Some(Message::CheckAddress { address, reply }) = rx.recv().await else {
                panic!("expected check request");
            };
            assert_eq!(address, "123 Main St, Miami, FL 33125");
            let _ = reply.send(ExplicitOutcome::Unavailable);
        });

        let outcome = handle
            .check_address("123 Main St, Miami, FL 33125".to_string())
            .await;
        assert_eq!(outcome, Some(ExplicitOutcome::Unavailable));
    }

    #[tokio::test]
    async fn test_dropped_task_reports_absent() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let handle = PipelineHandle::new(tx, Duration::from_secs(1));
        assert!(handle.auth_status().await.is_none());
    }
}
