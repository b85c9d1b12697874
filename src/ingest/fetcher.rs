//! Catch-up fetcher: bounded range log queries that close gaps between
//! the persisted checkpoint and the chain head.
//!
//! Used from three places: the startup sweep, the periodic scheduler,
//! and the polling subscriber variant for HTTP-only chains. All paths
//! share the same contract:
//!
//! - `from > to` is a no-op success
//! - logs are delivered to the processor in `(block_number, log_index)`
//!   order
//! - the checkpoint advances to `to` only after every log in the range
//!   has been durably handled (skippable per-log failures do not block
//!   advancement; store outages do)
//! - transient RPC failures retry with exponential backoff capped at
//!   30 s before surfacing a fetch error

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::rpc::types::{Filter, Log};
use tracing::{debug, info, instrument, warn};

use crate::config::{ChainSettings, FetchSettings};
use crate::error::{InfraError, Result};
use crate::ports::{ClientResolver, IntentStore};
use crate::types::enums::EventFamily;
use crate::types::primitives::{BlockNumber, ChainId};

use super::backoff::backoff_delay;
use super::decoder::family_signatures;
use super::processor::EventProcessor;

// ═══════════════════════════════════════════════════════════════════════════════
// CATCH-UP FETCHER
// ═══════════════════════════════════════════════════════════════════════════════

/// Range-query ingestion over `(checkpoint, head]` windows.
pub struct CatchupFetcher<S> {
    store: Arc<S>,
    resolver: Arc<dyn ClientResolver>,
    processor: Arc<EventProcessor<S>>,
    settings: FetchSettings,
    /// Gateway contract per chain.
    contracts: HashMap<ChainId, Address>,
    /// Checkpoint bootstrap block per chain.
    default_blocks: HashMap<ChainId, BlockNumber>,
}

impl<S> std::fmt::Debug for CatchupFetcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatchupFetcher")
            .field("chains", &self.contracts.keys().collect::<Vec<_>>())
            .field("max_retries", &self.settings.max_retries)
            .finish()
    }
}

impl<S> CatchupFetcher<S>
where
    S: IntentStore,
{
    /// Build a fetcher for the configured chains.
    ///
    /// # Errors
    ///
    /// Returns an initialization error if any configured contract
    /// address fails to parse.
    pub fn new(
        store: Arc<S>,
        resolver: Arc<dyn ClientResolver>,
        processor: Arc<EventProcessor<S>>,
        settings: FetchSettings,
        chains: &[ChainSettings],
    ) -> Result<Self> {
        let mut contracts = HashMap::new();
        let mut default_blocks = HashMap::new();
        for chain in chains {
            let contract = chain
                .contract()
                .map_err(crate::error::AppError::Initialization)?;
            contracts.insert(chain.id(), contract);
            default_blocks.insert(chain.id(), chain.default_block());
        }

        Ok(Self {
            store,
            resolver,
            processor,
            settings,
            contracts,
            default_blocks,
        })
    }

    /// Sweep `(checkpoint, head]` for one `(chain, family)` pair.
    ///
    /// # Errors
    ///
    /// Propagates head-fetch failures, exhausted range queries, and
    /// non-skippable processing failures.
    pub async fn catch_up_to_head(&self, chain: ChainId, family: EventFamily) -> Result<usize> {
        let client = self.resolver.get_client(chain)?;
        let head = client.block_number().await?;
        self.catch_up_from_checkpoint(chain, family, BlockNumber::new(head))
            .await
    }

    /// Sweep `(checkpoint, to]`, bootstrapping from the chain's
    /// configured default block when no checkpoint is persisted.
    ///
    /// # Errors
    ///
    /// See [`Self::catch_up_range`].
    pub async fn catch_up_from_checkpoint(
        &self,
        chain: ChainId,
        family: EventFamily,
        to: BlockNumber,
    ) -> Result<usize> {
        let from = match self
            .store
            .get_last_processed_block(chain, family)
            .await
            .map_err(crate::error::AppError::from)?
        {
            Some(checkpoint) => checkpoint.last_block.next(),
            None => self
                .default_blocks
                .get(&chain)
                .copied()
                .unwrap_or(BlockNumber::new(0)),
        };

        self.catch_up_range(chain, family, from, to).await
    }

    /// Sweep an explicit `[from, to]` range.
    ///
    /// Returns the number of logs handed to the processor. An inverted
    /// range is a no-op success.
    ///
    /// # Errors
    ///
    /// Returns a fetch error once the range query exhausts its retries,
    /// or the first non-skippable processing failure (in which case the
    /// checkpoint is left untouched so the next pass re-covers the
    /// range).
    #[instrument(skip(self), fields(chain = %chain, family = %family, from = %from, to = %to))]
    pub async fn catch_up_range(
        &self,
        chain: ChainId,
        family: EventFamily,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<usize> {
        if from > to {
            debug!("Nothing to catch up");
            return Ok(0);
        }

        let logs = self.fetch_with_retry(chain, family, from, to).await?;
        let total = logs.len();

        let mut skipped = 0usize;
        for log in logs {
            match self.processor.process_log(chain, &log).await {
                Ok(_) => {}
                Err(e) if e.is_skippable() => {
                    skipped += 1;
                    debug!(error = %e, block = log.block_number, "Skipping log");
                }
                Err(e) => {
                    // Leave the checkpoint behind; the next sweep
                    // re-covers this range
                    warn!(error = %e, block = log.block_number, "Aborting catch-up pass");
                    return Err(e);
                }
            }
        }

        self.store
            .update_last_processed_block(chain, family, to)
            .await
            .map_err(crate::error::AppError::from)?;

        info!(total, skipped, "Catch-up range complete");
        Ok(total)
    }

    /// Issue the range query, retrying transient failures with
    /// exponential backoff. Logs come back sorted by
    /// `(block_number, log_index)`.
    async fn fetch_with_retry(
        &self,
        chain: ChainId,
        family: EventFamily,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<Log>> {
        let client = self.resolver.get_client(chain)?;
        let filter = self.build_filter(chain, family, from, to)?;

        let mut last_error = String::new();
        for attempt in 0..self.settings.max_retries {
            match client.filter_logs(&filter).await {
                Ok(mut logs) => {
                    logs.sort_by_key(|log| (log.block_number, log.log_index));
                    return Ok(logs);
                }
                Err(e) => {
                    last_error = e.to_string();
                    let delay = backoff_delay(self.settings.base_delay(), attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = self.settings.max_retries,
                        error = %last_error,
                        delay_ms = delay.as_millis() as u64,
                        "Range query failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(InfraError::FetchExhausted {
            chain: chain.value(),
            attempts: self.settings.max_retries,
            reason: last_error,
        }
        .into())
    }

    /// Filter covering both variants of a family on the chain's gateway.
    pub fn build_filter(
        &self,
        chain: ChainId,
        family: EventFamily,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Filter> {
        let contract = self
            .contracts
            .get(&chain)
            .copied()
            .ok_or(InfraError::UnknownChain(chain.value()))?;

        Ok(Filter::new()
            .address(contract)
            .event_signature(family_signatures(family).to_vec())
            .from_block(from.value())
            .to_block(to.value()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
