//! Storage port for intent, fulfillment, settlement, and checkpoint
//! persistence.
//!
//! The trait defines the contract the ingestion engine consumes;
//! adapters implement it against concrete backends. The error contract
//! matters for idempotency: a missing row must classify as not-found
//! and a primary-key collision as duplicate (see
//! [`crate::error::StoreError`]).

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::entities::{Checkpoint, Fulfillment, Intent, Settlement};
use crate::types::enums::{EventFamily, IntentStatus};
use crate::types::primitives::{BlockNumber, ChainId, IntentId};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Cursor-less pagination window for listing queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}

/// Port for intent-protocol persistence.
///
/// Implementations must be concurrent-safe; the engine issues writes
/// from multiple subscriber tasks simultaneously and relies on
/// single-row writes being atomic.
#[async_trait]
pub trait IntentStore: Send + Sync {
    // ───────────────────────────────────────────────────────────────────────────
    // Intents
    // ───────────────────────────────────────────────────────────────────────────

    /// Insert a new intent.
    ///
    /// # Errors
    /// Returns a duplicate error if the id already exists.
    async fn create_intent(&self, intent: &Intent) -> StoreResult<()>;

    /// Fetch an intent by id.
    ///
    /// # Errors
    /// Returns a not-found error if absent.
    async fn get_intent(&self, id: IntentId) -> StoreResult<Intent>;

    /// List intents, most recent first.
    ///
    /// # Errors
    /// Returns an error if the backend query fails.
    async fn list_intents(&self, page: Page) -> StoreResult<Vec<Intent>>;

    /// Update an intent's status (also bumps `updated_at`).
    ///
    /// # Errors
    /// Returns a not-found error if the intent does not exist.
    async fn update_intent_status(&self, id: IntentId, status: IntentStatus) -> StoreResult<()>;

    // ───────────────────────────────────────────────────────────────────────────
    // Fulfillments
    // ───────────────────────────────────────────────────────────────────────────

    /// Insert a fulfillment.
    ///
    /// # Errors
    /// Returns a duplicate error if `(intent_id, tx_hash)` already exists.
    async fn create_fulfillment(&self, fulfillment: &Fulfillment) -> StoreResult<()>;

    /// Fetch a fulfillment by its natural key.
    ///
    /// # Errors
    /// Returns a not-found error if absent.
    async fn get_fulfillment(
        &self,
        intent_id: IntentId,
        tx_hash: alloy::primitives::B256,
    ) -> StoreResult<Fulfillment>;

    /// List all fulfillments for an intent, oldest first.
    ///
    /// # Errors
    /// Returns an error if the backend query fails.
    async fn list_fulfillments(&self, intent_id: IntentId) -> StoreResult<Vec<Fulfillment>>;

    // ───────────────────────────────────────────────────────────────────────────
    // Settlements
    // ───────────────────────────────────────────────────────────────────────────

    /// Insert a settlement.
    ///
    /// # Errors
    /// Returns a duplicate error if the intent already has one.
    async fn create_settlement(&self, settlement: &Settlement) -> StoreResult<()>;

    /// Fetch the settlement for an intent.
    ///
    /// # Errors
    /// Returns a not-found error if absent.
    async fn get_settlement(&self, intent_id: IntentId) -> StoreResult<Settlement>;

    // ───────────────────────────────────────────────────────────────────────────
    // Checkpoints
    // ───────────────────────────────────────────────────────────────────────────

    /// Last fully-processed block for a `(chain, family)` pair, if any.
    ///
    /// # Errors
    /// Returns an error if the backend query fails.
    async fn get_last_processed_block(
        &self,
        chain: ChainId,
        family: EventFamily,
    ) -> StoreResult<Option<Checkpoint>>;

    /// Advance the checkpoint for a `(chain, family)` pair.
    ///
    /// Implementations keep the maximum: a write with a block lower than
    /// the persisted value is a no-op, so concurrent advancement from
    /// the streaming and catch-up paths can never regress the row.
    ///
    /// # Errors
    /// Returns an error if the backend write fails.
    async fn update_last_processed_block(
        &self,
        chain: ChainId,
        family: EventFamily,
        block: BlockNumber,
    ) -> StoreResult<()>;
}
