//! Periodic catch-up scheduler.
//!
//! One task per service. Every `catchup.interval_mins` it arms a
//! catch-up pass over `(head − lookback, head]` for each
//! `(chain, family)` pair, the whole pass bounded by
//! `catchup.timeout_mins`. This is the self-healing layer: it closes
//! gaps left by missed streaming events without depending on stream
//! liveness, and idempotent processing absorbs the overlap.

use std::sync::Arc;

use tokio::time::{interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::CatchupSettings;
use crate::ports::{ClientResolver, IntentStore};
use crate::types::enums::EventFamily;
use crate::types::primitives::{BlockNumber, ChainId};

use super::fetcher::CatchupFetcher;

/// Interval-driven catch-up sweeps across all chains and families.
pub struct CatchupScheduler<S> {
    fetcher: Arc<CatchupFetcher<S>>,
    resolver: Arc<dyn ClientResolver>,
    settings: CatchupSettings,
    chains: Vec<ChainId>,
}

impl<S> std::fmt::Debug for CatchupScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchupScheduler")
            .field("chains", &self.chains)
            .field("interval", &self.settings.interval())
            .field("lookback_blocks", &self.settings.lookback_blocks)
            .finish()
    }
}

impl<S> CatchupScheduler<S>
where
    S: IntentStore,
{
    /// Create a scheduler over the given chains.
    #[must_use]
    pub fn new(
        fetcher: Arc<CatchupFetcher<S>>,
        resolver: Arc<dyn ClientResolver>,
        settings: CatchupSettings,
        chains: Vec<ChainId>,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            settings,
            chains,
        }
    }

    /// Run sweeps until cancelled.
    #[instrument(skip(self, cancel))]
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            interval_secs = self.settings.interval().as_secs(),
            lookback = self.settings.lookback_blocks,
            "Periodic catch-up scheduler started"
        );

        let mut tick = interval(self.settings.interval());
        // The immediate first tick duplicates the startup sweep; skip it
        tick.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Scheduler cancelled");
                    return;
                }
                _ = tick.tick() => {
                    if timeout(self.settings.timeout(), self.run_pass(&cancel))
                        .await
                        .is_err()
                    {
                        warn!(
                            timeout_secs = self.settings.timeout().as_secs(),
                            "Catch-up pass exceeded its deadline"
                        );
                    }
                }
            }
        }
    }

    /// One sweep over every `(chain, family)` pair.
    async fn run_pass(&self, cancel: &CancellationToken) {
        debug!("Catch-up pass starting");

        for &chain in &self.chains {
            let head = match self.resolver.get_client(chain) {
                Ok(client) => match client.block_number().await {
                    Ok(head) => head,
                    Err(e) => {
                        warn!(%chain, error = %e, "Head fetch failed, skipping chain");
                        continue;
                    }
                },
                Err(e) => {
                    warn!(%chain, error = %e, "No client, skipping chain");
                    continue;
                }
            };

            let from = BlockNumber::new(head).saturating_back(self.settings.lookback_blocks);
            let to = BlockNumber::new(head);

            for family in EventFamily::ALL {
                if cancel.is_cancelled() {
                    return;
                }
                match self.fetcher.catch_up_range(chain, family, from, to).await {
                    Ok(count) => {
                        if count > 0 {
                            info!(%chain, %family, count, "Catch-up pass recovered logs");
                        }
                    }
                    Err(e) => {
                        // The next cycle retries; nothing to unwind here
                        warn!(%chain, %family, error = %e, "Catch-up pass failed");
                    }
                }
            }
        }

        debug!("Catch-up pass complete");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy::primitives::{Address, B256};
    use alloy::rpc::types::{Filter, Log};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::abi::INTENT_GATEWAY_ABI;
    use crate::chain::StaticResolver;
    use crate::config::{ChainSettings, FetchSettings};
    use crate::error::InfraError;
    use crate::ingest::decoder::EventDecoder;
    use crate::ingest::processor::EventProcessor;
    use crate::ports::{ChainClient, LogSubscription, TransactionInfo};
    use crate::store::MemoryStore;

    const SOURCE: u64 = 7001;
    const CONTRACT: &str = "0x0000000000000000000000000000000000000001";

    #[derive(Debug, Default)]
    struct CountingClient {
        filter_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainClient for CountingClient {
        fn chain(&self) -> ChainId {
            ChainId::new(SOURCE)
        }
        fn supports_streaming(&self) -> bool {
            false
        }
        async fn block_number(&self) -> crate::error::Result<u64> {
            Ok(5000)
        }
        async fn filter_logs(&self, _f: &Filter) -> crate::error::Result<Vec<Log>> {
            self.filter_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
        async fn subscribe_logs(&self, _f: &Filter) -> crate::error::Result<LogSubscription> {
            Err(InfraError::Subscription("stub".into()).into())
        }
        async fn transaction_by_hash(
            &self,
            hash: B256,
        ) -> crate::error::Result<Option<TransactionInfo>> {
            Ok(Some(TransactionInfo {
                hash,
                sender: Address::repeat_byte(0x77),
            }))
        }
        async fn block_timestamp(
            &self,
            _n: u64,
        ) -> crate::error::Result<Option<DateTime<Utc>>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn pass_sweeps_every_family_and_advances_checkpoints() {
        let client = Arc::new(CountingClient::default());
        let store = Arc::new(MemoryStore::new());
        let resolver: Arc<dyn ClientResolver> =
            Arc::new(StaticResolver::new([
                Arc::clone(&client) as Arc<dyn ChainClient>
            ]));
        let decoder = EventDecoder::new(INTENT_GATEWAY_ABI, [ChainId::new(SOURCE)]).unwrap();
        let processor = Arc::new(EventProcessor::new(
            Arc::clone(&store),
            Arc::clone(&resolver),
            decoder,
        ));
        let chains = vec![ChainSettings {
            chain_id: SOURCE,
            rpc_url: "http://localhost:8545".into(),
            ws_url: None,
            contract_address: CONTRACT.into(),
            default_block: 0,
            poll_interval_ms: 1000,
        }];
        let fetcher = Arc::new(
            CatchupFetcher::new(
                Arc::clone(&store),
                Arc::clone(&resolver),
                processor,
                FetchSettings {
                    max_retries: 2,
                    base_delay_ms: 10,
                },
                &chains,
            )
            .unwrap(),
        );

        let scheduler = CatchupScheduler::new(
            fetcher,
            resolver,
            CatchupSettings {
                interval_mins: 1,
                timeout_mins: 1,
                lookback_blocks: 1000,
            },
            vec![ChainId::new(SOURCE)],
        );

        scheduler.run_pass(&CancellationToken::new()).await;

        // One range query per family
        assert_eq!(client.filter_calls.load(Ordering::SeqCst), 3);
        for family in EventFamily::ALL {
            let checkpoint = store
                .get_last_processed_block(ChainId::new(SOURCE), family)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(checkpoint.last_block, BlockNumber::new(5000));
        }
    }
}
