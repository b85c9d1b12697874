//! Alloy-backed chain client.
//!
//! One client per configured chain. The transport is chosen from
//! configuration: chains with a WebSocket endpoint get a
//! streaming-capable client, HTTP-only chains get a client whose
//! `supports_streaming()` is false, which routes them to the polling
//! subscriber variant.

use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionResponse;
use alloy::primitives::B256;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::config::ChainSettings;
use crate::error::{InfraError, Result};
use crate::ports::{ChainClient, LogSubscription, SubscriptionHandle, TransactionInfo};
use crate::types::primitives::ChainId;

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Timeout for the initial transport connection.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the transport-error side channel of a subscription.
const SUBSCRIPTION_ERROR_CAPACITY: usize = 10;

// ═══════════════════════════════════════════════════════════════════════════════
// ALLOY CHAIN CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Chain client backed by an Alloy provider.
#[derive(Debug)]
pub struct AlloyChainClient {
    chain: ChainId,
    provider: DynProvider,
    streaming: bool,
}

impl AlloyChainClient {
    /// Connect a client for the configured chain.
    ///
    /// Prefers the WebSocket endpoint when one is configured; the
    /// transport kind then decides the subscriber variant downstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established within
    /// the timeout.
    #[instrument(skip(settings), fields(chain = settings.chain_id))]
    pub async fn connect(settings: &ChainSettings) -> Result<Self> {
        let url = settings.ws_url.as_deref().unwrap_or(&settings.rpc_url);

        let provider = timeout(CONNECTION_TIMEOUT, ProviderBuilder::new().connect(url))
            .await
            .map_err(|_| InfraError::Timeout(format!("connect to chain {}", settings.chain_id)))?
            .map_err(|e| InfraError::Rpc(Box::new(e)))?
            .erased();

        debug!(url, streaming = settings.supports_streaming(), "Chain client connected");

        Ok(Self {
            chain: settings.id(),
            provider,
            streaming: settings.supports_streaming(),
        })
    }

    /// Wrap an already-built provider (used by tests and tools).
    #[must_use]
    pub const fn from_provider(chain: ChainId, provider: DynProvider, streaming: bool) -> Self {
        Self {
            chain,
            provider,
            streaming,
        }
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    fn chain(&self) -> ChainId {
        self.chain
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| InfraError::Rpc(Box::new(e)).into())
    }

    async fn filter_logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.provider
            .get_logs(filter)
            .await
            .map_err(|e| InfraError::Rpc(Box::new(e)).into())
    }

    async fn subscribe_logs(&self, filter: &Filter) -> Result<LogSubscription> {
        if !self.streaming {
            return Err(InfraError::Subscription(format!(
                "chain {} transport does not support streaming",
                self.chain
            ))
            .into());
        }

        let subscription = self
            .provider
            .subscribe_logs(filter)
            .await
            .map_err(|e| InfraError::Subscription(e.to_string()))?;

        // Capacity 1: a slow consumer back-pressures the transport
        let (log_tx, log_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::channel(SUBSCRIPTION_ERROR_CAPACITY);
        let handle = SubscriptionHandle::new();

        let cancel = handle.clone();
        let chain = self.chain;
        tokio::spawn(async move {
            let mut stream = subscription.into_stream();
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!(%chain, "Subscription forwarder cancelled");
                        break;
                    }
                    maybe_log = stream.next() => {
                        match maybe_log {
                            Some(log) => {
                                if log_tx.send(log).await.is_err() {
                                    // Consumer gone; nothing left to forward
                                    break;
                                }
                            }
                            None => {
                                // Upstream closed; dropping log_tx signals
                                // terminal closure to the subscriber
                                warn!(%chain, "Upstream log stream ended");
                                break;
                            }
                        }
                    }
                }
            }
            drop(err_tx);
        });

        Ok(LogSubscription {
            logs: log_rx,
            errors: err_rx,
            handle,
        })
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<TransactionInfo>> {
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| InfraError::Rpc(Box::new(e)))?;

        Ok(tx.map(|tx| TransactionInfo {
            hash,
            sender: tx.from(),
        }))
    }

    async fn block_timestamp(&self, number: u64) -> Result<Option<DateTime<Utc>>> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await
            .map_err(|e| InfraError::Rpc(Box::new(e)))?;

        // Block timestamps stay within i64 range for any realistic chain
        #[allow(clippy::cast_possible_wrap)]
        Ok(block.and_then(|b| DateTime::<Utc>::from_timestamp(b.header.timestamp as i64, 0)))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_timeout_is_reasonable() {
        assert!(CONNECTION_TIMEOUT >= Duration::from_secs(5));
        assert!(CONNECTION_TIMEOUT <= Duration::from_secs(30));
    }
}
