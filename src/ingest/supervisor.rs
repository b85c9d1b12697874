//! Subscription supervisor and shutdown controller.
//!
//! The supervisor owns the only shared mutable state in the service:
//! the live-task ledger, the terminal shutdown flag, and the
//! subscription registry. Everything is serialized through per-field
//! mutexes (the ledger doubles as the task counter).
//!
//! # Responsibilities
//!
//! - [`Supervisor::start_task`] - task accounting with panic capture;
//!   refuses silently once shutdown has begun
//! - [`Supervisor::shutdown`] - cancels the root token, tears down all
//!   subscriptions, and waits for the ledger to drain within a deadline
//! - [`Supervisor::resubscribe`] - unsubscribe-then-retry with
//!   exponential backoff after a stream error
//! - [`Supervisor::unsubscribe_all`] - registry sweep used during shutdown

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use alloy::rpc::types::Filter;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{InfraError, Result, ShutdownError};
use crate::ports::{ChainClient, LogSubscription, SubscriptionHandle};
use crate::types::enums::EventFamily;
use crate::types::primitives::ChainId;

use super::backoff::backoff_delay;

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Base delay for the resubscribe backoff sequence (1s, 2s, 4s, ...).
const RESUBSCRIBE_BASE_DELAY: Duration = Duration::from_secs(1);

/// Maximum resubscribe attempts before giving up on a stream.
const MAX_RESUBSCRIBE_ATTEMPTS: u32 = 5;

// ═══════════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Registry key: one live subscription per `(chain, family)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// Chain being watched.
    pub chain: ChainId,
    /// Event family being watched.
    pub family: EventFamily,
}

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.chain, self.family)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUPERVISOR
// ═══════════════════════════════════════════════════════════════════════════════

struct Inner {
    /// Root cancellation signal propagated to every task.
    cancel: CancellationToken,
    /// Terminal shutdown flag; once set, `start_task` refuses.
    shutdown: AtomicBool,
    /// Live-task ledger (id → name). Its length is the task counter.
    tasks: Mutex<HashMap<u64, String>>,
    /// Monotonic task id source.
    next_task_id: AtomicU64,
    /// Signaled whenever a task leaves the ledger.
    drained: Notify,
    /// Live subscriptions by key.
    registry: Mutex<HashMap<SubscriptionKey, SubscriptionHandle>>,
}

/// Task supervisor with shutdown coordination. Cheap to clone.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("active_tasks", &self.active_tasks())
            .field("subscriptions", &self.subscription_count())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Create a supervisor with a fresh root cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancel: CancellationToken::new(),
                shutdown: AtomicBool::new(false),
                tasks: Mutex::new(HashMap::new()),
                next_task_id: AtomicU64::new(0),
                drained: Notify::new(),
                registry: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Child token tied to the root cancellation signal.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.child_token()
    }

    /// Number of live tasks.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Number of live subscriptions in the registry.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::SeqCst)
    }

    /// Run `fut` as a supervised task.
    ///
    /// Returns `false` (without executing anything) once shutdown has
    /// begun. The task is entered in the ledger before it is spawned, so
    /// a concurrent `shutdown` always waits for it; the wrapper
    /// re-checks the flag before running the body, so a task that lost
    /// the race never executes. Panics are caught and logged, never
    /// propagated.
    pub fn start_task<F>(&self, name: &str, fut: F) -> bool
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown() {
            debug!(task = name, "Refusing task start after shutdown");
            return false;
        }

        let id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        self.inner.tasks.lock().insert(id, name.to_string());

        let inner = Arc::clone(&self.inner);
        let task_name = name.to_string();
        tokio::spawn(async move {
            if inner.shutdown.load(Ordering::SeqCst) {
                debug!(task = %task_name, "Shutdown won the start race; not executing");
            } else if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                let msg = panic_message(panic.as_ref());
                error!(task = %task_name, panic = %msg, "Supervised task panicked");
            }

            inner.tasks.lock().remove(&id);
            inner.drained.notify_waiters();
        });

        true
    }

    /// Shut the service down.
    ///
    /// Sets the terminal flag, cancels the root token, tears down every
    /// subscription, then waits for the task ledger to drain. Callable
    /// repeatedly: a second call after a timeout keeps waiting for the
    /// stragglers.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Timeout`] naming the outstanding tasks
    /// if the ledger has not drained when the deadline elapses.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, deadline: Duration) -> std::result::Result<(), ShutdownError> {
        if !self.inner.shutdown.swap(true, Ordering::SeqCst) {
            info!("Shutdown initiated");
        }
        self.inner.cancel.cancel();
        self.unsubscribe_all();

        let deadline_at = Instant::now() + deadline;
        loop {
            // Register interest before the emptiness check so a task
            // finishing in between cannot be missed.
            let drained = self.inner.drained.notified();

            if self.active_tasks() == 0 {
                info!("All tasks drained");
                return Ok(());
            }

            let Some(remaining) = deadline_at.checked_duration_since(Instant::now()) else {
                let outstanding = self.task_names();
                warn!(?outstanding, "Shutdown deadline elapsed");
                return Err(ShutdownError::Timeout { outstanding });
            };

            if tokio::time::timeout(remaining, drained).await.is_err() {
                let outstanding = self.task_names();
                warn!(?outstanding, "Shutdown deadline elapsed");
                return Err(ShutdownError::Timeout { outstanding });
            }
        }
    }

    /// Register a live subscription, tearing down any previous one for
    /// the same key first.
    pub fn register_subscription(&self, key: SubscriptionKey, handle: SubscriptionHandle) {
        let previous = self.inner.registry.lock().insert(key, handle);
        if let Some(old) = previous {
            warn!(%key, "Replacing live subscription");
            old.unsubscribe();
        }
    }

    /// Remove and tear down the subscription for a key, if present.
    pub fn drop_subscription(&self, key: SubscriptionKey) {
        if let Some(handle) = self.inner.registry.lock().remove(&key) {
            handle.unsubscribe();
        }
    }

    /// Tear down every registered subscription.
    pub fn unsubscribe_all(&self) {
        let handles: Vec<(SubscriptionKey, SubscriptionHandle)> =
            self.inner.registry.lock().drain().collect();
        for (key, handle) in handles {
            debug!(%key, "Unsubscribing");
            handle.unsubscribe();
        }
    }

    /// Replace a failed subscription.
    ///
    /// Tears down the old stream, then retries the subscribe call with
    /// exponential backoff (1s, 2s, 4s, ... capped at 30s) for up to
    /// five attempts. On success the new handle replaces the old one in
    /// the registry and the fresh streams are returned to the caller.
    ///
    /// # Errors
    ///
    /// Returns the last subscribe failure once attempts are exhausted,
    /// or a subscription error if shutdown begins mid-retry. The caller
    /// (the subscriber) exits on error.
    #[instrument(skip(self, client, filter), fields(key = %key))]
    pub async fn resubscribe(
        &self,
        key: SubscriptionKey,
        client: &dyn ChainClient,
        filter: &Filter,
    ) -> Result<LogSubscription> {
        self.drop_subscription(key);

        let mut last_error = String::new();
        for attempt in 0..MAX_RESUBSCRIBE_ATTEMPTS {
            if self.is_shutdown() {
                return Err(
                    InfraError::Subscription("shutdown during resubscribe".into()).into(),
                );
            }

            match client.subscribe_logs(filter).await {
                Ok(subscription) => {
                    info!(attempt = attempt + 1, "Resubscribed");
                    self.register_subscription(key, subscription.handle.clone());
                    return Ok(subscription);
                }
                Err(e) => {
                    last_error = e.to_string();
                    let delay = backoff_delay(RESUBSCRIBE_BASE_DELAY, attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = MAX_RESUBSCRIBE_ATTEMPTS,
                        error = %last_error,
                        delay_ms = delay.as_millis() as u64,
                        "Resubscribe attempt failed"
                    );

                    tokio::select! {
                        () = self.inner.cancel.cancelled() => {
                            return Err(InfraError::Subscription(
                                "shutdown during resubscribe backoff".into(),
                            )
                            .into());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Err(InfraError::Subscription(format!(
            "resubscribe exhausted {MAX_RESUBSCRIBE_ATTEMPTS} attempts: {last_error}"
        ))
        .into())
    }

    fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.tasks.lock().values().cloned().collect();
        names.sort();
        names
    }
}

/// Best-effort human-readable message from a panic payload.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic.downcast_ref::<&str>().map_or_else(
        || {
            panic
                .downcast_ref::<String>()
                .cloned()
                .unwrap_or_else(|| "unknown panic".into())
        },
        |s| (*s).to_string(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
