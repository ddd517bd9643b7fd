//! OzScan Circuit Breaker
//!
//! Failure isolation for the remote lookup service. The breaker tracks
//! consecutive failures and short-circuits calls for a cooldown window
//! instead of retrying a failing dependency immediately.
//!
//! # State machine
//!
//! - `CLOSED` → `OPEN` after `failure_threshold` consecutive failures, with
//!   `next_attempt = now + backoff` and the backoff growing exponentially
//!   up to a cap, so repeated failures during probing escalate the wait
//!   rather than looping tightly.
//! - `OPEN` → `HALF_OPEN` automatically once the deadline passes; a probe
//!   call is allowed through. Failures are not reset until a probe
//!   succeeds.
//! - Any success in `HALF_OPEN` or `CLOSED` resets failures to zero and
//!   forces `CLOSED`.
//!
//! The breaker is process-wide state; it converts to and from the
//! [`BreakerRecord`] persisted by the `ozscan-core` state store. Rate
//! limiting (HTTP 429) is deliberately not routed through `on_failure` —
//! a throttled service is healthy, and the queue pause handles it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use chrono::Utc;
use ozscan_core::{BreakerConfig, BreakerRecord, BreakerStateKind};

/// Circuit breaker guarding the remote service boundary.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    failures: u32,
    last_failure_ms: Option<i64>,
    state: BreakerStateKind,
    next_attempt_ms: Option<i64>,
}

impl CircuitBreaker {
    /// Create a closed breaker with the given tuning.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            failures: 0,
            last_failure_ms: None,
            state: BreakerStateKind::Closed,
            next_attempt_ms: None,
        }
    }

    /// Rebuild a breaker from its persisted record.
    #[must_use]
    pub fn from_record(record: BreakerRecord, config: BreakerConfig) -> Self {
        Self {
            config,
            failures: record.failures,
            last_failure_ms: record.last_failure_ms,
            state: record.state,
            next_attempt_ms: record.next_attempt_ms,
        }
    }

    /// Export the current state for persistence.
    #[must_use]
    pub fn record(&self) -> BreakerRecord {
        BreakerRecord {
            failures: self.failures,
            last_failure_ms: self.last_failure_ms,
            state: self.state,
            next_attempt_ms: self.next_attempt_ms,
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// While open and before the deadline this returns `false`; once the
    /// deadline passes the breaker flips to half-open and permits a probe.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Utc::now().timestamp_millis())
    }

    /// [`allow`](Self::allow) with an explicit clock, for deterministic tests.
    pub fn allow_at(&mut self, now_ms: i64) -> bool {
        match self.state {
            BreakerStateKind::Closed | BreakerStateKind::HalfOpen => true,
            BreakerStateKind::Open => {
                let deadline = self.next_attempt_ms.unwrap_or(now_ms);
                if now_ms >= deadline {
                    tracing::debug!("breaker deadline passed, permitting probe");
                    self.state = BreakerStateKind::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call: reset failures and force closed.
    pub fn on_success(&mut self) {
        if self.failures > 0 || self.state != BreakerStateKind::Closed {
            tracing::debug!(failures = self.failures, "breaker reset after success");
        }
        self.failures = 0;
        self.last_failure_ms = None;
        self.state = BreakerStateKind::Closed;
        self.next_attempt_ms = None;
    }

    /// Record a failed call.
    pub fn on_failure(&mut self) {
        self.on_failure_at(Utc::now().timestamp_millis());
    }

    /// [`on_failure`](Self::on_failure) with an explicit clock, for
    /// deterministic tests.
    pub fn on_failure_at(&mut self, now_ms: i64) {
        self.failures += 1;
        self.last_failure_ms = Some(now_ms);

        if self.failures >= self.config.failure_threshold {
            let backoff = self.backoff_ms();
            self.state = BreakerStateKind::Open;
            self.next_attempt_ms = Some(now_ms + backoff);
            tracing::warn!(
                failures = self.failures,
                backoff_ms = backoff,
                "breaker opened"
            );
        }
    }

    /// Current consecutive failure count.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Current state machine position.
    #[must_use]
    pub fn state(&self) -> BreakerStateKind {
        self.state
    }

    /// Deadline before which open-state calls are short-circuited.
    #[must_use]
    pub fn next_attempt_ms(&self) -> Option<i64> {
        self.next_attempt_ms
    }

    /// `min(max_backoff, reset_timeout * multiplier^(failures - threshold))`
    fn backoff_ms(&self) -> i64 {
        let exponent = self.failures.saturating_sub(self.config.failure_threshold);
        let factor = i64::from(self.config.backoff_multiplier).checked_pow(exponent);

        factor
            .and_then(|f| self.config.reset_timeout_ms.checked_mul(f))
            .map_or(self.config.max_backoff_ms, |ms| {
                ms.min(self.config.max_backoff_ms)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            reset_timeout_ms: 1000,
            backoff_multiplier: 2,
            max_backoff_ms: 8000,
        }
    }

    fn tripped_breaker(now_ms: i64) -> CircuitBreaker {
        let mut breaker = CircuitBreaker::new(test_config());
        for _ in 0..3 {
            breaker.on_failure_at(now_ms);
        }
        breaker
    }

    #[test]
    fn test_closed_allows() {
        let mut breaker = CircuitBreaker::new(test_config());
        assert!(breaker.allow_at(0));
        assert_eq!(breaker.state(), BreakerStateKind::Closed);
    }

    #[test]
    fn test_opens_at_threshold() {
        let mut breaker = CircuitBreaker::new(test_config());
        breaker.on_failure_at(0);
        breaker.on_failure_at(0);
        assert_eq!(breaker.state(), BreakerStateKind::Closed);
        assert!(breaker.allow_at(0));

        breaker.on_failure_at(0);
        assert_eq!(breaker.state(), BreakerStateKind::Open);
        assert!(!breaker.allow_at(0));
        // First open uses the base timeout (multiplier^0)
        assert_eq!(breaker.next_attempt_ms(), Some(1000));
    }

    #[test]
    fn test_deadline_permits_probe_exactly_once_before_reopen() {
        let mut breaker = tripped_breaker(0);
        assert!(!breaker.allow_at(999));

        // Deadline passed: half-open probe allowed
        assert!(breaker.allow_at(1000));
        assert_eq!(breaker.state(), BreakerStateKind::HalfOpen);

        // Probe fails: reopens with a larger backoff than before
        breaker.on_failure_at(1000);
        assert_eq!(breaker.state(), BreakerStateKind::Open);
        assert_eq!(breaker.next_attempt_ms(), Some(1000 + 2000));
        assert!(!breaker.allow_at(1500));
    }

    #[test]
    fn test_backoff_escalates_and_caps() {
        let mut breaker = tripped_breaker(0);
        // failures = 3 → backoff 1000; keep failing probes
        breaker.on_failure_at(0); // failures 4 → 2000
        assert_eq!(breaker.next_attempt_ms(), Some(2000));
        breaker.on_failure_at(0); // failures 5 → 4000
        assert_eq!(breaker.next_attempt_ms(), Some(4000));
        breaker.on_failure_at(0); // failures 6 → 8000
        assert_eq!(breaker.next_attempt_ms(), Some(8000));
        breaker.on_failure_at(0); // failures 7 → capped at 8000
        assert_eq!(breaker.next_attempt_ms(), Some(8000));
    }

    #[test]
    fn test_success_resets_and_closes() {
        let mut breaker = tripped_breaker(0);
        assert!(breaker.allow_at(1000));

        breaker.on_success();
        assert_eq!(breaker.state(), BreakerStateKind::Closed);
        assert_eq!(breaker.failures(), 0);
        assert!(breaker.next_attempt_ms().is_none());
        assert!(breaker.allow_at(1001));
    }

    #[test]
    fn test_failures_survive_half_open_until_success() {
        let mut breaker = tripped_breaker(0);
        assert!(breaker.allow_at(1000));
        assert_eq!(breaker.state(), BreakerStateKind::HalfOpen);
        // The probe being allowed does not reset accumulated failures
        assert_eq!(breaker.failures(), 3);
    }

    #[test]
    fn test_record_round_trip() {
        let breaker = tripped_breaker(500);
        let record = breaker.record();
        assert_eq!(record.state, BreakerStateKind::Open);
        assert_eq!(record.failures, 3);

        let restored = CircuitBreaker::from_record(record, test_config());
        assert_eq!(restored.state(), BreakerStateKind::Open);
        assert_eq!(restored.next_attempt_ms(), Some(1500));
    }

    #[test]
    fn test_backoff_overflow_falls_back_to_cap() {
        let config = BreakerConfig {
            failure_threshold: 1,
            reset_timeout_ms: i64::MAX / 2,
            backoff_multiplier: 2,
            max_backoff_ms: 5000,
        };
        let mut breaker = CircuitBreaker::new(config);
        breaker.on_failure_at(0);
        breaker.on_failure_at(0);
        breaker.on_failure_at(0);
        // Exponent overflow clamps to the configured cap
        assert_eq!(breaker.next_attempt_ms(), Some(5000));
    }
}
