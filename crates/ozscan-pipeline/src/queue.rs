//! Per-page-session lookup queue.
//!
//! FIFO with an idempotent enqueue (a seen-set keyed by normalized
//! address), a hard per-page quota consumed on dequeue, and a pause window
//! set by rate-limit signals. The quota is permanent for the session:
//! only an explicit manual rescan resets it.

use chrono::Utc;
use ozscan_core::NormalizedAddress;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Queue lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueState {
    /// Nothing pending
    #[default]
    Idle,
    /// A dequeue happened and the drain loop is working
    Processing,
    /// Rate limited; dequeues refuse until the pause lifts
    Paused,
}

/// One pending lookup: the raw address as extracted plus its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLookup {
    /// Address as extracted from the page
    pub raw: String,
    /// Normalized cache/deduplication key
    pub key: NormalizedAddress,
}

/// Outcome of a dequeue attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dequeue {
    /// Next lookup to process
    Item(QueuedLookup),
    /// Nothing pending
    Empty,
    /// Rate-limit pause still in effect; entries persist
    Paused {
        /// Epoch millis when dequeues resume
        until_ms: i64,
    },
    /// Page quota consumed; only a manual rescan resets it
    QuotaExhausted,
}

/// FIFO lookup queue with seen-set, quota, and pause window.
#[derive(Debug, Clone)]
pub struct LookupQueue {
    pending: VecDeque<QueuedLookup>,
    seen: HashSet<NormalizedAddress>,
    state: QueueState,
    checks_used: u32,
    max_checks: u32,
    paused_until_ms: Option<i64>,
}

impl LookupQueue {
    /// Create an empty queue with the given per-page quota.
    #[must_use]
    pub fn new(max_checks: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            seen: HashSet::new(),
            state: QueueState::Idle,
            checks_used: 0,
            max_checks,
            paused_until_ms: None,
        }
    }

    /// Add an address unless its normalized form was already seen this
    /// session. Returns whether it was added.
    pub fn enqueue(&mut self, raw: &str) -> bool {
        let key = NormalizedAddress::new(raw);
        if !self.seen.insert(key.clone()) {
            return false;
        }

        debug!(key = %key, "enqueued lookup");
        self.pending.push_back(QueuedLookup {
            raw: raw.to_string(),
            key,
        });
        true
    }

    /// Attempt to dequeue the next lookup.
    ///
    /// The pause window is honored before anything else; the quota is
    /// consumed by a successful dequeue.
    pub fn try_dequeue(&mut self) -> Dequeue {
        self.try_dequeue_at(Utc::now().timestamp_millis())
    }

    /// [`try_dequeue`](Self::try_dequeue) with an explicit clock, for
    /// deterministic tests.
    pub fn try_dequeue_at(&mut self, now_ms: i64) -> Dequeue {
        if let Some(until_ms) = self.paused_until_ms {
            if now_ms < until_ms {
                self.state = QueueState::Paused;
                return Dequeue::Paused { until_ms };
            }
            debug!("rate-limit pause elapsed, resuming");
            self.paused_until_ms = None;
        }

        if self.checks_used >= self.max_checks {
            self.state = QueueState::Idle;
            return Dequeue::QuotaExhausted;
        }

        match self.pending.pop_front() {
            Some(item) => {
                self.checks_used += 1;
                self.state = QueueState::Processing;
                Dequeue::Item(item)
            }
            None => {
                self.state = QueueState::Idle;
                Dequeue::Empty
            }
        }
    }

    /// Pause dequeues for a backoff window starting now.
    pub fn pause_for(&mut self, backoff_ms: i64) {
        self.pause_for_at(backoff_ms, Utc::now().timestamp_millis());
    }

    /// [`pause_for`](Self::pause_for) with an explicit clock.
    pub fn pause_for_at(&mut self, backoff_ms: i64, now_ms: i64) {
        self.paused_until_ms = Some(now_ms + backoff_ms);
        self.state = QueueState::Paused;
        debug!(backoff_ms, "queue paused after rate limit");
    }

    /// Lift the pause window after it has been waited out.
    ///
    /// The drain loop sleeps for the full backoff and then calls this, so
    /// dequeues are not left gated on a wall clock that may lag the
    /// waited interval.
    pub fn resume(&mut self) {
        if self.paused_until_ms.take().is_some() {
            debug!("rate-limit pause lifted");
        }
        if self.state == QueueState::Paused {
            self.state = QueueState::Idle;
        }
    }

    /// Manual rescan: drop pending entries, the seen-set, the quota, and
    /// any pause window.
    pub fn reset(&mut self) {
        debug!(
            dropped = self.pending.len(),
            checks_used = self.checks_used,
            "queue reset for manual rescan"
        );
        self.pending.clear();
        self.seen.clear();
        self.checks_used = 0;
        self.paused_until_ms = None;
        self.state = QueueState::Idle;
    }

    /// Forget which addresses were seen without touching the quota.
    ///
    /// Used when the page's content changes substantially under the same
    /// session (SPA navigation).
    pub fn clear_seen(&mut self) {
        self.seen.clear();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> QueueState {
        self.state
    }

    /// Number of pending lookups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Lookups consumed against the page quota so far.
    #[must_use]
    pub fn checks_used(&self) -> u32 {
        self.checks_used
    }

    /// Lookups remaining before the page quota.
    #[must_use]
    pub fn quota_remaining(&self) -> u32 {
        self.max_checks.saturating_sub(self.checks_used)
    }
}
