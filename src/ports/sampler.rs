//! Read-only counter sampling port for the metrics collector.
//!
//! The collector must not hold subscriber or processor handles (that
//! would create a reference cycle); instead each worker exposes this
//! narrow sampler and the collector holds only sampler handles.

use crate::types::enums::EventFamily;
use crate::types::primitives::ChainId;

/// Snapshot of a worker's counters at a sampling instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Events fully processed.
    pub events_processed: u64,
    /// Events skipped as duplicates.
    pub events_skipped: u64,
    /// Per-event processing errors.
    pub processing_errors: u64,
    /// Successful resubscriptions after stream errors.
    pub reconnections: u64,
    /// Unix seconds of the last event seen, if any.
    pub last_event_unix: Option<i64>,
    /// Unix seconds of the last health tick, if any.
    pub last_health_check_unix: Option<i64>,
}

/// Port exposing a worker's counters to the metrics collector.
pub trait IngestSampler: Send + Sync {
    /// Short worker name for metric labels (e.g. `processor`,
    /// `subscriber`).
    fn name(&self) -> &'static str;

    /// Chain the worker serves; `None` for service-wide workers.
    fn chain(&self) -> Option<ChainId>;

    /// Event family the worker serves, if scoped to one.
    fn family(&self) -> Option<EventFamily>;

    /// Current counter values.
    fn sample(&self) -> CounterSnapshot;
}
