//! Per-chain event subscribers.
//!
//! One subscriber per `(chain, event-family)` pair. Two variants share
//! the same outward contract, selected by the resolved client's
//! capability:
//!
//! - **Streaming**: installs a live log subscription anchored at the
//!   current head (history below the head is the catch-up fetcher's
//!   job) and multiplexes on logs, stream errors, health ticks, debug
//!   ticks, and cancellation.
//! - **Polling** (HTTP-only chains): drives the catch-up fetcher over
//!   `(checkpoint, head]` on a fixed interval.
//!
//! # Failure behavior
//!
//! Per-log processing failures are surfaced on the service error
//! channel but never terminate the subscriber. A stream error degrades
//! the subscriber into the supervisor's resubscribe path; resubscribe
//! exhaustion or a closed log stream is terminal and the subscriber
//! returns, decrementing the supervisor's live-task ledger. A panic
//! inside log handling is recovered, reported, and after a short pause
//! the subscriber tears its stream down so the supervisor may start a
//! fresh one.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use alloy::rpc::types::{Filter, Log};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::ports::{ChainClient, CounterSnapshot, IngestSampler, IntentStore, LogSubscription};
use crate::types::enums::EventFamily;
use crate::types::primitives::{BlockNumber, ChainId};

use super::decoder::family_signatures;
use super::fetcher::CatchupFetcher;
use super::processor::EventProcessor;
use super::supervisor::{SubscriptionKey, Supervisor};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Deadline for handling a single streamed log.
const LOG_DEADLINE: Duration = Duration::from_secs(30);

/// Interval between health ticks.
const HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Interval between debug stat lines.
const DEBUG_INTERVAL: Duration = Duration::from_secs(300);

/// Pause after a recovered panic before tearing the stream down.
const PANIC_PAUSE: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CHANNEL
// ═══════════════════════════════════════════════════════════════════════════════

/// Error report emitted on the service error channel.
#[derive(Debug, Clone)]
pub struct SubscriberError {
    /// Which subscriber reported it.
    pub key: SubscriptionKey,
    /// What happened.
    pub message: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COUNTERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-subscriber atomic counters, exposed via [`SubscriberSampler`].
#[derive(Debug, Default)]
struct SubscriberCounters {
    events_processed: AtomicU64,
    events_skipped: AtomicU64,
    processing_errors: AtomicU64,
    reconnections: AtomicU64,
    last_event_unix: AtomicI64,
    last_health_check_unix: AtomicI64,
}

impl SubscriberCounters {
    fn snapshot(&self) -> CounterSnapshot {
        let last_event = self.last_event_unix.load(Ordering::Relaxed);
        let last_health = self.last_health_check_unix.load(Ordering::Relaxed);
        CounterSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_skipped: self.events_skipped.load(Ordering::Relaxed),
            processing_errors: self.processing_errors.load(Ordering::Relaxed),
            reconnections: self.reconnections.load(Ordering::Relaxed),
            last_event_unix: (last_event != 0).then_some(last_event),
            last_health_check_unix: (last_health != 0).then_some(last_health),
        }
    }
}

/// Sampler handle over one subscriber's counters.
#[derive(Debug, Clone)]
pub struct SubscriberSampler {
    key: SubscriptionKey,
    counters: Arc<SubscriberCounters>,
}

impl IngestSampler for SubscriberSampler {
    fn name(&self) -> &'static str {
        "subscriber"
    }

    fn chain(&self) -> Option<ChainId> {
        Some(self.key.chain)
    }

    fn family(&self) -> Option<EventFamily> {
        Some(self.key.family)
    }

    fn sample(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUBSCRIBER
// ═══════════════════════════════════════════════════════════════════════════════

/// What the log-handling step tells the run loop to do next.
enum Flow {
    Continue,
    Teardown,
}

/// Subscriber for one `(chain, event-family)` pair.
pub struct ChainSubscriber<S> {
    key: SubscriptionKey,
    client: Arc<dyn ChainClient>,
    processor: Arc<EventProcessor<S>>,
    store: Arc<S>,
    fetcher: Arc<CatchupFetcher<S>>,
    supervisor: Supervisor,
    error_tx: mpsc::Sender<SubscriberError>,
    contract: alloy::primitives::Address,
    poll_interval: Duration,
    counters: Arc<SubscriberCounters>,
}

impl<S> std::fmt::Debug for ChainSubscriber<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainSubscriber")
            .field("key", &self.key)
            .field("streaming", &self.client.supports_streaming())
            .finish()
    }
}

impl<S> ChainSubscriber<S>
where
    S: IntentStore + 'static,
{
    /// Create a subscriber. The variant (streaming vs polling) is
    /// decided at run time from the client's capability.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        chain: ChainId,
        family: EventFamily,
        contract: alloy::primitives::Address,
        client: Arc<dyn ChainClient>,
        processor: Arc<EventProcessor<S>>,
        store: Arc<S>,
        fetcher: Arc<CatchupFetcher<S>>,
        supervisor: Supervisor,
        error_tx: mpsc::Sender<SubscriberError>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            key: SubscriptionKey { chain, family },
            client,
            processor,
            store,
            fetcher,
            supervisor,
            error_tx,
            contract,
            poll_interval,
            counters: Arc::new(SubscriberCounters::default()),
        }
    }

    /// Task name for the supervisor ledger.
    #[must_use]
    pub fn task_name(&self) -> String {
        format!("subscriber-{}-{}", self.key.chain, self.key.family)
    }

    /// Sampler handle for the metrics collector.
    #[must_use]
    pub fn sampler(&self) -> SubscriberSampler {
        SubscriberSampler {
            key: self.key,
            counters: Arc::clone(&self.counters),
        }
    }

    /// Run until cancellation or terminal stream failure.
    #[instrument(skip(self, cancel), fields(key = %self.key))]
    pub async fn run(self, cancel: CancellationToken) {
        if self.client.supports_streaming() {
            self.run_streaming(cancel).await;
        } else {
            self.run_polling(cancel).await;
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Streaming variant
    // ───────────────────────────────────────────────────────────────────────────

    async fn run_streaming(&self, cancel: CancellationToken) {
        // initializing: anchor the filter at the current head; history
        // below it belongs to the catch-up fetcher
        let head = match self.client.block_number().await {
            Ok(head) => head,
            Err(e) => {
                self.report(format!("head fetch failed: {e}"));
                return;
            }
        };
        let filter = self.build_filter(head);

        let subscription = match self.client.subscribe_logs(&filter).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.report(format!("initial subscribe failed: {e}"));
                return;
            }
        };
        self.supervisor
            .register_subscription(self.key, subscription.handle.clone());
        info!(from_block = head, "Subscribed");

        let LogSubscription {
            mut logs,
            mut errors,
            ..
        } = subscription;

        let mut health = interval(HEALTH_INTERVAL);
        let mut stats = interval(DEBUG_INTERVAL);
        // A drained error channel must not spin the select loop
        let mut errors_open = true;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Cancelled");
                    break;
                }

                _ = health.tick() => {
                    self.counters
                        .last_health_check_unix
                        .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
                }

                _ = stats.tick() => {
                    let snapshot = self.counters.snapshot();
                    debug!(
                        processed = snapshot.events_processed,
                        skipped = snapshot.events_skipped,
                        errors = snapshot.processing_errors,
                        reconnections = snapshot.reconnections,
                        "Subscriber stats"
                    );
                }

                maybe_error = errors.recv(), if errors_open => {
                    match maybe_error {
                        Some(stream_error) => {
                            // degraded: swap in a fresh subscription
                            warn!(error = %stream_error, "Stream error, resubscribing");
                            match self
                                .supervisor
                                .resubscribe(self.key, self.client.as_ref(), &filter)
                                .await
                            {
                                Ok(fresh) => {
                                    self.counters.reconnections.fetch_add(1, Ordering::Relaxed);
                                    logs = fresh.logs;
                                    errors = fresh.errors;
                                    errors_open = true;
                                }
                                Err(e) => {
                                    self.report(format!("resubscribe failed: {e}"));
                                    break;
                                }
                            }
                        }
                        None => {
                            errors_open = false;
                        }
                    }
                }

                maybe_log = logs.recv() => {
                    match maybe_log {
                        Some(log) => {
                            if matches!(self.handle_log(log).await, Flow::Teardown) {
                                break;
                            }
                        }
                        None => {
                            // Closed without a stream error: terminal
                            info!("Log stream closed, stopping subscriber");
                            break;
                        }
                    }
                }
            }
        }

        self.supervisor.drop_subscription(self.key);
    }

    /// Process one streamed log under the per-log deadline, with panic
    /// recovery.
    async fn handle_log(&self, log: Log) -> Flow {
        let block = log.block_number;
        let started = std::time::Instant::now();

        let outcome = std::panic::AssertUnwindSafe(timeout(
            LOG_DEADLINE,
            self.processor.process_log(self.key.chain, &log),
        ))
        .catch_unwind()
        .await;

        ::metrics::histogram!("intent_indexer_log_processing_seconds")
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Err(_panic) => {
                self.counters.processing_errors.fetch_add(1, Ordering::Relaxed);
                error!(block, "Panic while handling log");
                self.report("panic while handling log".into());
                tokio::time::sleep(PANIC_PAUSE).await;
                Flow::Teardown
            }
            Ok(Err(_elapsed)) => {
                self.counters.processing_errors.fetch_add(1, Ordering::Relaxed);
                self.report(format!("log processing exceeded {LOG_DEADLINE:?}"));
                Flow::Continue
            }
            Ok(Ok(Err(e))) => {
                self.counters.processing_errors.fetch_add(1, Ordering::Relaxed);
                if e.is_skippable() {
                    debug!(block, error = %e, "Skipping log");
                } else {
                    self.report(format!("log processing failed: {e}"));
                }
                Flow::Continue
            }
            Ok(Ok(Ok(outcome))) => {
                self.counters
                    .last_event_unix
                    .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
                match outcome {
                    super::processor::ProcessOutcome::Processed => {
                        self.counters.events_processed.fetch_add(1, Ordering::Relaxed);
                    }
                    super::processor::ProcessOutcome::Skipped => {
                        self.counters.events_skipped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                // The log is durably written; the streaming checkpoint
                // may advance to its block
                if let Some(block) = block {
                    self.advance_checkpoint(BlockNumber::new(block)).await;
                }
                Flow::Continue
            }
        }
    }

    async fn advance_checkpoint(&self, block: BlockNumber) {
        if let Err(e) = self
            .store
            .update_last_processed_block(self.key.chain, self.key.family, block)
            .await
        {
            warn!(error = %e, %block, "Checkpoint advance failed");
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Polling variant (HTTP-only chains)
    // ───────────────────────────────────────────────────────────────────────────

    async fn run_polling(&self, cancel: CancellationToken) {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Polling (no streaming transport)");
        let mut tick = interval(self.poll_interval);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Cancelled");
                    return;
                }
                _ = tick.tick() => {
                    match self
                        .fetcher
                        .catch_up_to_head(self.key.chain, self.key.family)
                        .await
                    {
                        Ok(count) => {
                            if count > 0 {
                                self.counters
                                    .events_processed
                                    .fetch_add(count as u64, Ordering::Relaxed);
                                self.counters
                                    .last_event_unix
                                    .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
                            }
                        }
                        Err(e) => {
                            self.counters.processing_errors.fetch_add(1, Ordering::Relaxed);
                            self.report(format!("poll pass failed: {e}"));
                        }
                    }
                    self.counters
                        .last_health_check_unix
                        .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
                }
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Helpers
    // ───────────────────────────────────────────────────────────────────────────

    fn build_filter(&self, from_block: u64) -> Filter {
        Filter::new()
            .address(self.contract)
            .event_signature(family_signatures(self.key.family).to_vec())
            .from_block(from_block)
    }

    /// Push onto the bounded error channel; drop when full so a stalled
    /// monitor can never deadlock ingestion.
    fn report(&self, message: String) {
        let report = SubscriberError {
            key: self.key,
            message,
        };
        if let Err(mpsc::error::TrySendError::Full(report)) = self.error_tx.try_send(report) {
            debug!(message = %report.message, "Error channel full, dropping report");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
