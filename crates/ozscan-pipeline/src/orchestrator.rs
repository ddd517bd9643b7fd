//! Lookup orchestration for both flows.
//!
//! The orchestrator owns the cache, breaker, and queue, and runs as a
//! single task: all mutations happen between its suspension points, so no
//! read-modify-write ever spans an awaited call on stale state.
//!
//! Passive flow: extract (site fan-out, then page-level fallback) →
//! validate → enqueue → drain, where each dequeued address goes
//! cache → breaker → auth → remote → cache write → deliver. Per-address
//! failures degrade to a skip; a rate limit pauses the queue and the
//! drain waits out the pause rather than dropping queued work.
//!
//! Explicit flow: detection chain, user confirmation (with server-side
//! re-normalization on edit), then the same per-address path.

use crate::messages::{
    AddressResult, DetectOutcome, EditOutcome, ExplicitOutcome, Message, PipelineHandle,
    ScanReport,
};
use crate::queue::{Dequeue, LookupQueue};
use chrono::Utc;
use ozscan_breaker::CircuitBreaker;
use ozscan_cache::ResultCache;
use ozscan_client::{LookupBackend, LookupError};
use ozscan_core::{LookupResult, NormalizedAddress, PipelineConfig, StateStore};
use ozscan_sites::SiteRegistry;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of one address's trip through cache → breaker → auth → remote.
enum Step {
    Done(LookupResult),
    RateLimited,
    Unavailable,
}

/// Single-task owner of the pipeline's shared mutable state.
pub struct Orchestrator<B> {
    backend: B,
    config: PipelineConfig,
    registry: SiteRegistry,
    store: StateStore,
    cache: ResultCache,
    breaker: CircuitBreaker,
    queue: LookupQueue,
    last_signature: HashSet<NormalizedAddress>,
}

impl<B: LookupBackend> Orchestrator<B> {
    /// Build an orchestrator, restoring cache and breaker state from the
    /// store. Unreadable state is discarded, not fatal.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        backend: B,
        registry: SiteRegistry,
        store: StateStore,
    ) -> Self {
        let cache = match store.load_cache() {
            Ok(Some(snapshot)) => {
                ResultCache::from_snapshot(snapshot, config.cache.limit, config.cache.ttl_ms)
            }
            Ok(None) => ResultCache::new(config.cache.limit, config.cache.ttl_ms),
            Err(error) => {
                warn!(%error, "discarding unreadable cache snapshot");
                ResultCache::new(config.cache.limit, config.cache.ttl_ms)
            }
        };

        let breaker = match store.load_breaker() {
            Ok(Some(record)) => CircuitBreaker::from_record(record, config.breaker.clone()),
            Ok(None) => CircuitBreaker::new(config.breaker.clone()),
            Err(error) => {
                warn!(%error, "discarding unreadable breaker record");
                CircuitBreaker::new(config.breaker.clone())
            }
        };

        let queue = LookupQueue::new(config.scan.max_checks_per_page);

        Self {
            backend,
            config,
            registry,
            store,
            cache,
            breaker,
            queue,
            last_signature: HashSet::new(),
        }
    }

    /// Spawn the orchestrator task and return a caller handle.
    #[must_use]
    pub fn spawn(self, reply_timeout: Duration) -> PipelineHandle
    where
        B: 'static,
    {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(self.serve(rx));
        PipelineHandle::new(tx, reply_timeout)
    }

    /// Consume messages until the channel closes.
    pub async fn serve(mut self, mut rx: mpsc::Receiver<Message>) {
        while let Some(message) = rx.recv().await {
            self.handle(message).await;
        }
        debug!("message channel closed, orchestrator stopping");
    }

    async fn handle(&mut self, message: Message) {
        match message {
            Message::ScanPage {
                html,
                url,
                manual,
                reply,
            } => {
                let _ = reply.send(self.scan_page(&html, &url, manual).await);
            }
            Message::DetectAddress {
                html,
                url,
                selection,
                manual_entry,
                reply,
            } => {
                let outcome = self
                    .detect_address(&html, &url, selection.as_deref(), manual_entry.as_deref())
                    .await;
                let _ = reply.send(outcome);
            }
            Message::CheckAddress { address, reply } => {
                let _ = reply.send(self.check_confirmed(&address).await);
            }
            Message::EditAddress { address, reply } => {
                let _ = reply.send(self.edit_address(&address).await);
            }
            Message::AuthStatus { reply } => {
                let _ = reply.send(self.backend.auth_status().await);
            }
            Message::ForceTokenRefresh => {
                if let Err(error) = self.backend.force_token_refresh().await {
                    warn!(%error, "forced token refresh failed");
                }
            }
        }
    }

    /// Passive flow entry point.
    pub async fn scan_page(&mut self, html: &str, url: &str, manual: bool) -> ScanReport {
        if manual {
            self.queue.reset();
        }

        let mut candidates = ozscan_extract::extract_with_registry(html, url, &self.registry);
        if candidates.is_empty() {
            candidates = ozscan_extract::extract_with_ceiling(
                html,
                url,
                self.config.scan.text_node_ceiling,
            );
        }

        let signature: HashSet<NormalizedAddress> = candidates
            .iter()
            .map(|candidate| NormalizedAddress::new(candidate))
            .collect();
        if !manual && signature_changed(&self.last_signature, &signature) {
            info!("page content changed substantially, clearing seen-set");
            self.queue.clear_seen();
        }
        self.last_signature = signature;

        let mut report = ScanReport {
            candidates: candidates.len(),
            ..ScanReport::default()
        };
        for candidate in &candidates {
            if self.queue.enqueue(candidate) {
                report.enqueued += 1;
            }
        }

        self.drain(&mut report).await;
        self.persist();

        info!(
            url,
            candidates = report.candidates,
            results = report.results.len(),
            skipped = report.skipped,
            "scan complete"
        );
        report
    }

    /// Drain the queue until it empties or hits the quota.
    ///
    /// A rate-limit pause suspends the drain until the window elapses;
    /// pending entries persist and are processed once it lifts.
    async fn drain(&mut self, report: &mut ScanReport) {
        loop {
            match self.queue.try_dequeue() {
                Dequeue::Empty => break,
                Dequeue::QuotaExhausted => {
                    debug!("page quota exhausted, stopping drain");
                    report.quota_exhausted = true;
                    break;
                }
                Dequeue::Paused { until_ms } => {
                    report.rate_limited = true;
                    let wait_ms =
                        u64::try_from(until_ms - Utc::now().timestamp_millis()).unwrap_or(0);
                    debug!(wait_ms, "queue paused, waiting out the backoff");
                    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
                    // The waited window is authoritative; the wall clock
                    // may lag behind a paused test clock
                    self.queue.resume();
                }
                Dequeue::Item(item) => {
                    match self.lookup_address(&item.raw).await {
                        Step::Done(result) => report.results.push(AddressResult {
                            address: item.raw,
                            result,
                        }),
                        Step::RateLimited => {
                            self.pause_queue();
                            report.rate_limited = true;
                            continue;
                        }
                        Step::Unavailable => report.skipped += 1,
                    }

                    // Fixed serialization interval, independent of how long
                    // the call itself took
                    if !self.queue.is_empty() {
                        tokio::time::sleep(Duration::from_millis(
                            self.config.queue.inter_request_delay_ms,
                        ))
                        .await;
                    }
                }
            }
        }
    }

    /// Explicit flow: ordered detection chain. The first stage yielding a
    /// plausible address wins; a rate limit aborts the whole chain.
    pub async fn detect_address(
        &mut self,
        html: &str,
        url: &str,
        selection: Option<&str>,
        manual_entry: Option<&str>,
    ) -> DetectOutcome {
        let from_text =
            ozscan_extract::scan_visible_text(html, self.config.scan.text_node_ceiling);
        if let Some(first) = from_text.into_iter().next() {
            debug!("detection: visible text");
            return DetectOutcome::Found(first);
        }

        if self.config.api.use_listing_address_fallback {
            match self.backend.resolve_listing_address(url).await {
                Ok(Some(address)) if ozscan_extract::validate_address(&address) => {
                    debug!("detection: listing-address resolution");
                    return DetectOutcome::Found(address);
                }
                Ok(_) => {}
                Err(LookupError::RateLimited { .. }) => {
                    self.pause_queue();
                    return DetectOutcome::OverLimit;
                }
                Err(error) => {
                    // Degrade to the next stage; the chain has fallbacks
                    warn!(%error, "listing-address resolution failed");
                }
            }
        }

        for stage in [selection, manual_entry].into_iter().flatten() {
            let trimmed = stage.trim();
            if ozscan_extract::validate_address(trimmed) {
                debug!("detection: user-provided text");
                return DetectOutcome::Found(trimmed.to_string());
            }
        }

        DetectOutcome::NotFound
    }

    /// Explicit flow: look up a user-confirmed address.
    pub async fn check_confirmed(&mut self, address: &str) -> ExplicitOutcome {
        let outcome = match self.lookup_address(address).await {
            Step::Done(result) => ExplicitOutcome::Result(result),
            Step::RateLimited => {
                self.pause_queue();
                ExplicitOutcome::OverLimit
            }
            Step::Unavailable => ExplicitOutcome::Unavailable,
        };
        self.persist();
        outcome
    }

    /// Explicit flow: server-side re-normalization of an edited address.
    pub async fn edit_address(&mut self, edited: &str) -> EditOutcome {
        match self.backend.geocode(edited).await {
            Ok(Some(canonical)) => EditOutcome::Renormalized(canonical),
            // Unresolvable edits stand as typed; confirmation decides
            Ok(None) => EditOutcome::Renormalized(edited.trim().to_string()),
            Err(LookupError::RateLimited { .. }) => {
                self.pause_queue();
                EditOutcome::OverLimit
            }
            Err(error) => {
                warn!(%error, "re-normalization failed");
                EditOutcome::Unavailable
            }
        }
    }

    /// One address through cache → breaker → auth → remote → cache write.
    ///
    /// A cache hit short-circuits everything after it: no breaker check,
    /// no token work, no usage increment.
    async fn lookup_address(&mut self, raw: &str) -> Step {
        let key = NormalizedAddress::new(raw);

        if let Some(hit) = self.cache.get(&key) {
            debug!(key = %key, "cache hit");
            return Step::Done(hit);
        }

        if !self.breaker.allow() {
            debug!(key = %key, "breaker open, short-circuiting");
            return Step::Unavailable;
        }

        match self.backend.check_address(raw).await {
            Ok(result) => {
                self.breaker.on_success();
                self.cache.put(&key, result.clone());
                Step::Done(result)
            }
            Err(LookupError::RateLimited { code }) => {
                // Throttling is not a service failure; the breaker stays out
                warn!(?code, "rate limited");
                Step::RateLimited
            }
            Err(LookupError::BreakerOpen) => Step::Unavailable,
            Err(LookupError::Auth(reason)) => {
                warn!(reason, "lookup failed on authentication");
                Step::Unavailable
            }
            Err(error @ (LookupError::Unavailable(_) | LookupError::Protocol(_))) => {
                warn!(%error, "lookup failed");
                self.breaker.on_failure();
                Step::Unavailable
            }
        }
    }

    fn pause_queue(&mut self) {
        let backoff =
            i64::try_from(self.config.queue.rate_limit_backoff_ms).unwrap_or(i64::MAX);
        self.queue.pause_for(backoff);
    }

    /// Write-through the cache and breaker state.
    fn persist(&self) {
        if let Err(error) = self.store.save_cache(&self.cache.snapshot()) {
            warn!(%error, "failed to persist cache snapshot");
        }
        if let Err(error) = self.store.save_breaker(&self.breaker.record()) {
            warn!(%error, "failed to persist breaker record");
        }
    }

    /// Queue state, for diagnostics and tests.
    #[must_use]
    pub fn queue(&self) -> &LookupQueue {
        &self.queue
    }
}

/// Whether at least a quarter of the combined address set changed.
fn signature_changed(
    old: &HashSet<NormalizedAddress>,
    new: &HashSet<NormalizedAddress>,
) -> bool {
    if old.is_empty() {
        return false;
    }
    let shared = new.intersection(old).count();
    let union = new.union(old).count();
    (union - shared) * 4 >= union
}
