//! Metrics collection and exposition.
//!
//! The [`MetricsCollector`] samples every registered
//! [`IngestSampler`] on a fixed cadence and publishes the readings as
//! gauges through the `metrics` facade; the optional Prometheus
//! exporter (wired in `main`) serves them over HTTP. The collector
//! holds only narrow sampler handles, never the workers themselves.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use ::metrics::{Label, gauge};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ingest::Supervisor;
use crate::ports::IngestSampler;

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Sampling cadence.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(15);

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN NAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Human-readable name for a chain id; unknown ids get `chain_<n>`.
#[must_use]
pub fn chain_name(id: u64) -> Cow<'static, str> {
    match id {
        1 => Cow::Borrowed("ethereum"),
        10 => Cow::Borrowed("optimism"),
        56 => Cow::Borrowed("bsc"),
        137 => Cow::Borrowed("polygon"),
        8453 => Cow::Borrowed("base"),
        42161 => Cow::Borrowed("arbitrum"),
        43114 => Cow::Borrowed("avalanche"),
        7000 => Cow::Borrowed("zetachain"),
        7001 => Cow::Borrowed("zetachain_testnet"),
        n => Cow::Owned(format!("chain_{n}")),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METRICS COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Periodic sampler of worker counters.
pub struct MetricsCollector {
    samplers: Vec<Arc<dyn IngestSampler>>,
    supervisor: Supervisor,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("samplers", &self.samplers.len())
            .finish()
    }
}

impl MetricsCollector {
    /// Create a collector over the given sampler handles.
    #[must_use]
    pub const fn new(samplers: Vec<Arc<dyn IngestSampler>>, supervisor: Supervisor) -> Self {
        Self {
            samplers,
            supervisor,
        }
    }

    /// Sample on the fixed cadence until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            samplers = self.samplers.len(),
            interval_secs = SAMPLE_INTERVAL.as_secs(),
            "Metrics collector started"
        );

        let mut tick = interval(SAMPLE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Metrics collector cancelled");
                    return;
                }
                _ = tick.tick() => self.collect(),
            }
        }
    }

    /// One sampling sweep.
    #[allow(clippy::cast_precision_loss)] // Counter magnitudes are far below 2^52
    pub fn collect(&self) {
        gauge!("intent_indexer_active_tasks").set(self.supervisor.active_tasks() as f64);
        gauge!("intent_indexer_subscriptions").set(self.supervisor.subscription_count() as f64);

        for sampler in &self.samplers {
            let snapshot = sampler.sample();
            let chain = sampler
                .chain()
                .map_or(Cow::Borrowed("service"), |c| chain_name(c.value()));
            let family = sampler.family().map_or("all", |f| f.as_str());
            let worker = sampler.name();

            let labels = vec![
                Label::new("worker", worker),
                Label::new("chain", chain.into_owned()),
                Label::new("family", family),
            ];

            gauge!("intent_indexer_events_processed", labels.clone())
                .set(snapshot.events_processed as f64);
            gauge!("intent_indexer_events_skipped", labels.clone())
                .set(snapshot.events_skipped as f64);
            gauge!("intent_indexer_processing_errors", labels.clone())
                .set(snapshot.processing_errors as f64);
            gauge!("intent_indexer_reconnections", labels.clone())
                .set(snapshot.reconnections as f64);
            if let Some(ts) = snapshot.last_event_unix {
                gauge!("intent_indexer_last_event_timestamp", labels.clone()).set(ts as f64);
            }
            if let Some(ts) = snapshot.last_health_check_unix {
                gauge!("intent_indexer_last_health_check_timestamp", labels).set(ts as f64);
            }
        }

        debug!("Metrics sampled");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
