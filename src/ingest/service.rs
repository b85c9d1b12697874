//! Service wiring: constructs the engine and runs it under the
//! supervisor.
//!
//! Startup order matters:
//!
//! 1. One catch-up pass per `(chain, family)` from the persisted
//!    checkpoint to head, closing the restart gap
//! 2. Subscribers go live (head-anchored, so no overlap with step 1
//!    beyond what idempotency absorbs)
//! 3. The periodic scheduler, error monitor, and metrics collector
//!
//! Shutdown reverses it: the supervisor cancels the root token, tears
//! down every subscription, and waits for the task ledger to drain
//! within the configured deadline.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use crate::abi::INTENT_GATEWAY_ABI;
use crate::config::Settings;
use crate::error::{Result, ShutdownError};
use crate::metrics::MetricsCollector;
use crate::ports::{ClientResolver, IngestSampler, IntentStore};
use crate::types::enums::EventFamily;

use super::decoder::EventDecoder;
use super::fetcher::CatchupFetcher;
use super::processor::EventProcessor;
use super::scheduler::CatchupScheduler;
use super::subscriber::{ChainSubscriber, SubscriberError};
use super::supervisor::Supervisor;

/// Capacity of the service-wide error channel; full means drop.
const ERROR_CHANNEL_CAPACITY: usize = 10;

/// The assembled ingestion engine.
pub struct IngestionService<S> {
    settings: Settings,
    store: Arc<S>,
    resolver: Arc<dyn ClientResolver>,
    processor: Arc<EventProcessor<S>>,
    fetcher: Arc<CatchupFetcher<S>>,
    supervisor: Supervisor,
}

impl<S> std::fmt::Debug for IngestionService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionService")
            .field("chains", &self.settings.supported_chains())
            .field("supervisor", &self.supervisor)
            .finish()
    }
}

impl<S> IngestionService<S>
where
    S: IntentStore + 'static,
{
    /// Assemble the engine from configuration, a store adapter, and a
    /// client resolver.
    ///
    /// # Errors
    ///
    /// Returns an initialization error if the embedded ABI fails its
    /// cross-check or a configured contract address is invalid.
    pub fn new(
        settings: Settings,
        store: Arc<S>,
        resolver: Arc<dyn ClientResolver>,
    ) -> Result<Self> {
        let decoder = EventDecoder::new(INTENT_GATEWAY_ABI, settings.supported_chains())?;
        let processor = Arc::new(EventProcessor::new(
            Arc::clone(&store),
            Arc::clone(&resolver),
            decoder,
        ));
        let fetcher = Arc::new(CatchupFetcher::new(
            Arc::clone(&store),
            Arc::clone(&resolver),
            Arc::clone(&processor),
            settings.fetch,
            &settings.chains,
        )?);

        Ok(Self {
            settings,
            store,
            resolver,
            processor,
            fetcher,
            supervisor: Supervisor::new(),
        })
    }

    /// The supervisor driving this service's tasks.
    #[must_use]
    pub const fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Run the startup sweep and spawn every worker task.
    ///
    /// Returns once the workers are live; they keep running until
    /// [`Self::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns an error if a configured chain has no resolvable client
    /// or an invalid contract address. Startup catch-up failures are
    /// logged, not fatal: the periodic scheduler retries them.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        // 1. Close the restart gap
        for chain in self.settings.supported_chains() {
            for family in EventFamily::ALL {
                match self.fetcher.catch_up_to_head(chain, family).await {
                    Ok(count) => {
                        if count > 0 {
                            info!(%chain, %family, count, "Startup catch-up ingested logs");
                        }
                    }
                    Err(e) => {
                        warn!(%chain, %family, error = %e, "Startup catch-up failed; scheduler will retry");
                    }
                }
            }
        }

        // 2. Error fan-in
        let (error_tx, mut error_rx) = mpsc::channel::<SubscriberError>(ERROR_CHANNEL_CAPACITY);
        let monitor_cancel = self.supervisor.cancellation();
        self.supervisor.start_task("error-monitor", async move {
            loop {
                tokio::select! {
                    () = monitor_cancel.cancelled() => return,
                    maybe = error_rx.recv() => {
                        let Some(report) = maybe else { return };
                        warn!(key = %report.key, message = %report.message, "Subscriber error");
                    }
                }
            }
        });

        // 3. Subscribers, one per (chain, family)
        let mut samplers: Vec<Arc<dyn IngestSampler>> = vec![Arc::new(self.processor.sampler())];
        for chain_settings in &self.settings.chains {
            let chain = chain_settings.id();
            let client = self.resolver.get_client(chain)?;
            let contract = chain_settings
                .contract()
                .map_err(crate::error::AppError::Initialization)?;

            for family in EventFamily::ALL {
                let subscriber = ChainSubscriber::new(
                    chain,
                    family,
                    contract,
                    Arc::clone(&client),
                    Arc::clone(&self.processor),
                    Arc::clone(&self.store),
                    Arc::clone(&self.fetcher),
                    self.supervisor.clone(),
                    error_tx.clone(),
                    chain_settings.poll_interval(),
                );
                samplers.push(Arc::new(subscriber.sampler()));

                let name = subscriber.task_name();
                let cancel = self.supervisor.cancellation();
                self.supervisor.start_task(&name, subscriber.run(cancel));
            }
        }

        // 4. Periodic self-healing sweeps
        let scheduler = CatchupScheduler::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.resolver),
            self.settings.catchup,
            self.settings.supported_chains(),
        );
        let cancel = self.supervisor.cancellation();
        self.supervisor
            .start_task("catchup-scheduler", scheduler.run(cancel));

        // 5. Metrics sampling
        let collector = MetricsCollector::new(samplers, self.supervisor.clone());
        let cancel = self.supervisor.cancellation();
        self.supervisor
            .start_task("metrics-collector", collector.run(cancel));

        info!(
            tasks = self.supervisor.active_tasks(),
            "Ingestion service started"
        );
        Ok(())
    }

    /// Shut the service down within the configured deadline.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Timeout`] naming the outstanding tasks.
    pub async fn shutdown(&self) -> std::result::Result<(), ShutdownError> {
        self.supervisor
            .shutdown(self.settings.shutdown_timeout())
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use alloy::primitives::{Address, B256};
    use alloy::rpc::types::{Filter, Log};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::chain::StaticResolver;
    use crate::config::{
        CatchupSettings, ChainSettings, DatabaseSettings, FetchSettings, LoggingSettings,
        MetricsSettings,
    };
    use crate::error::InfraError;
    use crate::ports::{ChainClient, LogSubscription, TransactionInfo};
    use crate::store::MemoryStore;
    use crate::types::primitives::{BlockNumber, ChainId};

    const SOURCE: u64 = 7001;
    const CONTRACT: &str = "0x0000000000000000000000000000000000000001";

    #[derive(Debug)]
    struct QuietClient;

    #[async_trait]
    impl ChainClient for QuietClient {
        fn chain(&self) -> ChainId {
            ChainId::new(SOURCE)
        }
        fn supports_streaming(&self) -> bool {
            false
        }
        async fn block_number(&self) -> crate::error::Result<u64> {
            Ok(100)
        }
        async fn filter_logs(&self, _f: &Filter) -> crate::error::Result<Vec<Log>> {
            Ok(vec![])
        }
        async fn subscribe_logs(&self, _f: &Filter) -> crate::error::Result<LogSubscription> {
            Err(InfraError::Subscription("no streaming".into()).into())
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

    fn settings() -> Settings {
        Settings {
            chains: vec![ChainSettings {
                chain_id: SOURCE,
                rpc_url: "http://localhost:8545".into(),
                ws_url: None,
                contract_address: CONTRACT.into(),
                default_block: 0,
                poll_interval_ms: 50,
            }],
            catchup: CatchupSettings {
                interval_mins: 1,
                timeout_mins: 1,
                lookback_blocks: 100,
            },
            fetch: FetchSettings {
                max_retries: 2,
                base_delay_ms: 10,
            },
            database: DatabaseSettings {
                url: "postgres://localhost/test".into(),
                max_connections: 5,
                min_connections: 1,
                connect_timeout_ms: 1000,
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: "pretty".into(),
            },
            metrics: MetricsSettings {
                enabled: false,
                host: "127.0.0.1".into(),
                port: 9090,
            },
            shutdown_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn start_spawns_workers_and_shutdown_drains_them() {
        let store = Arc::new(MemoryStore::new());
        let resolver: Arc<dyn ClientResolver> =
            Arc::new(StaticResolver::new([
                Arc::new(QuietClient) as Arc<dyn ChainClient>
            ]));

        let service = IngestionService::new(settings(), Arc::clone(&store), resolver).unwrap();
        service.start().await.unwrap();

        // error-monitor + 3 subscribers + scheduler + collector
        assert_eq!(service.supervisor().active_tasks(), 6);

        // Startup sweep advanced every family's checkpoint to head
        for family in EventFamily::ALL {
            let checkpoint = store
                .get_last_processed_block(ChainId::new(SOURCE), family)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(checkpoint.last_block, BlockNumber::new(100));
        }

        service.shutdown().await.unwrap();
        assert_eq!(service.supervisor().active_tasks(), 0);
    }
}
