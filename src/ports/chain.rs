//! Chain transport ports: client, subscription, and resolver.
//!
//! The engine never talks to a provider type directly; it consumes the
//! [`ChainClient`] trait so tests can script chain behavior and so
//! WebSocket-capable and HTTP-only transports stay interchangeable
//! behind the same contract.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::primitives::ChainId;

// ═══════════════════════════════════════════════════════════════════════════════
// SUBSCRIPTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Handle for cancelling a live log subscription.
///
/// Clones share the same underlying subscription; any clone may
/// unsubscribe. The supervisor's registry holds a clone while the
/// subscriber owns the receiving ends.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle {
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    /// Create a fresh handle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    /// Tear the subscription down. Idempotent.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    /// Whether the subscription has been torn down.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Future that resolves when the subscription is torn down.
    ///
    /// Transport implementations select on this inside their forwarding
    /// loops.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// A live log subscription.
///
/// `logs` carries the stream; `errors` carries transport errors that
/// should trigger resubscription. The log channel closing without a
/// preceding error is a terminal stream closure.
#[derive(Debug)]
pub struct LogSubscription {
    /// Stream of matching logs. Capacity 1: a slow consumer
    /// back-pressures the transport.
    pub logs: mpsc::Receiver<Log>,
    /// Transport error stream.
    pub errors: mpsc::Receiver<String>,
    /// Cancellation handle (a clone lives in the supervisor registry).
    pub handle: SubscriptionHandle,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Transaction details the decoder needs for sender recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionInfo {
    /// Transaction hash.
    pub hash: B256,
    /// Recovered signer.
    pub sender: Address,
}

/// Port over a single chain's RPC transport.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain this client is connected to.
    fn chain(&self) -> ChainId;

    /// Whether the transport supports push log streaming.
    ///
    /// HTTP-only chains return `false` and are served by the polling
    /// subscriber variant.
    fn supports_streaming(&self) -> bool;

    /// Current head block number.
    ///
    /// # Errors
    /// Returns an RPC error on transport failure.
    async fn block_number(&self) -> Result<u64>;

    /// Range log query.
    ///
    /// # Errors
    /// Returns an RPC error on transport failure.
    async fn filter_logs(&self, filter: &Filter) -> Result<Vec<Log>>;

    /// Install a streaming log subscription.
    ///
    /// # Errors
    /// Returns a subscription error if the transport does not support
    /// streaming or the subscribe call fails.
    async fn subscribe_logs(&self, filter: &Filter) -> Result<LogSubscription>;

    /// Fetch a transaction and its recovered signer.
    ///
    /// Returns `None` for unknown hashes.
    ///
    /// # Errors
    /// Returns an RPC error on transport failure.
    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<TransactionInfo>>;

    /// Timestamp of a block, if the block exists.
    ///
    /// The processor prefers this over wall clock when stamping
    /// entities.
    ///
    /// # Errors
    /// Returns an RPC error on transport failure.
    async fn block_timestamp(&self, number: u64) -> Result<Option<chrono::DateTime<chrono::Utc>>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLIENT RESOLVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Port mapping a chain id to its live client.
///
/// The processor resolves the *correct* chain for timestamp lookups
/// (source chain for initiated events, destination chain otherwise)
/// through this port.
pub trait ClientResolver: Send + Sync {
    /// Resolve the client for a chain.
    ///
    /// # Errors
    /// Returns [`crate::error::InfraError::UnknownChain`] if no client
    /// is registered for the id.
    fn get_client(&self, chain: ChainId) -> Result<Arc<dyn ChainClient>>;

    /// All chains this resolver can serve.
    fn chains(&self) -> Vec<ChainId>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_unsubscribe_is_idempotent() {
        let handle = SubscriptionHandle::new();
        assert!(!handle.is_cancelled());

        handle.unsubscribe();
        handle.unsubscribe();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn handle_clones_share_state() {
        let handle = SubscriptionHandle::new();
        let clone = handle.clone();

        clone.unsubscribe();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_unsubscribe() {
        let handle = SubscriptionHandle::new();
        handle.unsubscribe();
        // Must not hang
        handle.cancelled().await;
    }
}
