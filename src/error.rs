//! Layered error types for the intent indexer.
//!
//! This module provides a hierarchical error system:
//!
//! - [`DecodeError`] - Log decoding failures (unknown signature, bad shape)
//! - [`ValidationError`] - Semantic invariant violations on decoded events
//! - [`StoreError`] - Persistence failures with not-found / duplicate classification
//! - [`InfraError`] - Infrastructure errors (RPC, timeouts, channels, config)
//! - [`ShutdownError`] - Shutdown-deadline failures
//! - [`AppError`] - Application-level errors combining all of the above
//!
//! # Error Philosophy
//!
//! Per-event failures (decode, validation, duplicate writes) are skip-and-count:
//! the ingestion loop logs them, bumps a counter, and moves on. Infrastructure
//! failures trigger backoff and resubscription. The only error a caller of the
//! service ever sees is a shutdown timeout.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DECODE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors raised while decoding a raw log into a typed intent event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// `topic0` does not match any known event signature.
    #[error("unknown event signature: {0}")]
    UnknownEvent(String),

    /// The log does not have the shape the event schema requires
    /// (too few topics, short data section, malformed field encoding).
    #[error("malformed log: {0}")]
    Shape(String),

    /// The log is missing a field the chain is expected to populate
    /// (block number, transaction hash, log index).
    #[error("log missing {0}")]
    MissingField(&'static str),

    /// Fetching the initiating transaction or recovering its signer failed.
    #[error("sender recovery failed for tx {tx_hash}: {reason}")]
    SenderRecovery {
        /// Transaction hash the recovery was attempted for.
        tx_hash: String,
        /// Underlying failure description.
        reason: String,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Semantic invariant violations on an otherwise well-formed event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// Chain id is zero.
    #[error("chain id must be non-zero")]
    ZeroChain,

    /// Chain id is not in the configured supported set.
    #[error("unsupported chain id: {0}")]
    UnsupportedChain(u64),

    /// Source and destination chains are the same.
    #[error("source and destination chains must differ: {0}")]
    SameChain(u64),

    /// Amount is zero or exceeds the protocol cap.
    #[error("amount out of range: {0}")]
    AmountOutOfRange(String),

    /// Address is malformed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Receiver payload is shorter than an address.
    #[error("receiver too short: {0} bytes, need at least 20")]
    ReceiverTooShort(usize),

    /// Attempted status change that would regress the state machine.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current status.
        from: String,
        /// Attempted new status.
        to: String,
    },

    /// A fulfillment or settlement referenced an intent that has not
    /// been ingested yet.
    #[error("intent not found: {0}")]
    UnknownIntent(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Persistence errors with the classification contract the processor
/// relies on for idempotency.
///
/// Adapters outside this crate may return foreign error types; the contract
/// is message-based: a not-found error renders with the substring
/// `not found`, a duplicate-key error with `duplicate key`. The
/// [`StoreError::is_not_found`] and [`StoreError::is_duplicate`] helpers
/// honor both the variant and the message form.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Expected row is absent.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity kind (e.g. `intent`, `fulfillment`).
        entity: &'static str,
        /// Primary key that was looked up.
        key: String,
    },

    /// Insert collided with an existing primary key.
    #[error("duplicate key: {entity} {key}")]
    Duplicate {
        /// Entity kind.
        entity: &'static str,
        /// Colliding primary key.
        key: String,
    },

    /// Any other backend failure.
    #[error("store failure: {0}")]
    Other(String),
}

impl StoreError {
    /// Whether this error means the row simply does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Duplicate { .. } => false,
            Self::Other(msg) => msg.contains("not found"),
        }
    }

    /// Whether this error is a primary-key collision.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        match self {
            Self::Duplicate { .. } => true,
            Self::NotFound { .. } => false,
            Self::Other(msg) => msg.contains("duplicate key"),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::Other("row not found".into()),
            // Postgres renders 23505 as "duplicate key value violates ..."
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Other(db.message().to_string())
            }
            _ => Self::Other(err.to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// RPC error (node communication).
    #[error("RPC error: {0}")]
    Rpc(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Store adapter error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No client registered for a chain.
    #[error("no client for chain {0}")]
    UnknownChain(u64),

    /// Streaming subscription failure.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// A range log query exhausted its retry budget.
    #[error("range fetch failed for chain {chain} after {attempts} attempts: {reason}")]
    FetchExhausted {
        /// Chain the fetch targeted.
        chain: u64,
        /// Attempts made before giving up.
        attempts: u32,
        /// Last underlying failure.
        reason: String,
    },

    /// Timeout waiting for an operation.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Internal channel closed unexpectedly.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// Database pool / migration error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration file error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHUTDOWN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors returned by the supervisor's shutdown path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShutdownError {
    /// Live tasks outlived the shutdown deadline.
    #[error("shutdown timed out; outstanding tasks: {}", outstanding.join(", "))]
    Timeout {
        /// Names of the tasks still running when the deadline elapsed.
        outstanding: Vec<String>,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining all error layers.
///
/// This is the primary error type used throughout the crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Log decoding failure.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Semantic validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Infrastructure failure.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Shutdown-deadline failure.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),

    /// A task panicked and was recovered.
    #[error("task panicked: {0}")]
    Panic(String),

    /// Configuration error outside the config crate's own failures.
    #[error("configuration error: {0}")]
    Config(String),

    /// Startup wiring error.
    #[error("initialization error: {0}")]
    Initialization(String),
}

impl AppError {
    /// Whether the ingestion loop should skip the offending log and
    /// continue, rather than tear anything down.
    ///
    /// Decode and validation failures are per-log; duplicate and
    /// not-found store results are idempotency signals, not faults.
    #[must_use]
    pub fn is_skippable(&self) -> bool {
        match self {
            Self::Decode(_) | Self::Validation(_) => true,
            Self::Infra(InfraError::Store(e)) => e.is_duplicate() || e.is_not_found(),
            _ => false,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Infra(InfraError::Store(err))
    }
}

/// Type alias for application Results.
pub type Result<T> = std::result::Result<T, AppError>;

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_contains_substring() {
        let err = StoreError::NotFound {
            entity: "intent",
            key: "0xabc".into(),
        };
        assert!(err.to_string().contains("not found"));
        assert!(err.is_not_found());
        assert!(!err.is_duplicate());
    }

    #[test]
    fn duplicate_message_contains_substring() {
        let err = StoreError::Duplicate {
            entity: "intent",
            key: "0xabc".into(),
        };
        assert!(err.to_string().contains("duplicate key"));
        assert!(err.is_duplicate());
        assert!(!err.is_not_found());
    }

    #[test]
    fn foreign_duplicate_classified_by_message() {
        // Postgres-style message from an adapter outside this crate
        let err = StoreError::Other(
            "duplicate key value violates unique constraint \"intents_pkey\"".into(),
        );
        assert!(err.is_duplicate());
    }

    #[test]
    fn skippable_classification() {
        let decode: AppError = DecodeError::UnknownEvent("0xdead".into()).into();
        assert!(decode.is_skippable());

        let dup: AppError = StoreError::Duplicate {
            entity: "intent",
            key: "0x1".into(),
        }
        .into();
        assert!(dup.is_skippable());

        let rpc: AppError = InfraError::Timeout("block fetch".into()).into();
        assert!(!rpc.is_skippable());
    }

    #[test]
    fn shutdown_timeout_lists_tasks() {
        let err = ShutdownError::Timeout {
            outstanding: vec!["subscriber-7001-initiated".into(), "scheduler".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("subscriber-7001-initiated"));
        assert!(msg.contains("scheduler"));
    }
}
