//! In-memory store adapter.
//!
//! Concurrent-safe maps behind a single `parking_lot` lock. Used by the
//! test suites and for local runs without a database; it honors the
//! full store contract, including the not-found / duplicate error
//! classification and kept-max checkpoint semantics.

use std::collections::HashMap;

use alloy::primitives::B256;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use crate::error::StoreError;
use crate::ports::{IntentStore, Page, StoreResult};
use crate::types::entities::{Checkpoint, Fulfillment, Intent, Settlement};
use crate::types::enums::{EventFamily, IntentStatus};
use crate::types::primitives::{BlockNumber, ChainId, IntentId};

#[derive(Debug, Default)]
struct Tables {
    intents: HashMap<IntentId, Intent>,
    fulfillments: HashMap<(IntentId, B256), Fulfillment>,
    settlements: HashMap<IntentId, Settlement>,
    checkpoints: HashMap<(ChainId, EventFamily), BlockNumber>,
}

/// In-memory [`IntentStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Fault-injection slot: the next write fails with this error.
    injected_failure: Mutex<Option<StoreError>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored intents (test convenience).
    #[must_use]
    pub fn intent_count(&self) -> usize {
        self.tables.read().intents.len()
    }

    /// Make the next write operation fail with `error`.
    ///
    /// Fault-injection hook for exercising store-failure paths in
    /// tests.
    pub fn fail_next_write(&self, error: StoreError) {
        *self.injected_failure.lock() = Some(error);
    }

    fn take_injected(&self) -> StoreResult<()> {
        match self.injected_failure.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IntentStore for MemoryStore {
    async fn create_intent(&self, intent: &Intent) -> StoreResult<()> {
        self.take_injected()?;
        let mut tables = self.tables.write();
        if tables.intents.contains_key(&intent.id) {
            return Err(StoreError::Duplicate {
                entity: "intent",
                key: intent.id.to_hex(),
            });
        }
        tables.intents.insert(intent.id, intent.clone());
        Ok(())
    }

    async fn get_intent(&self, id: IntentId) -> StoreResult<Intent> {
        self.tables
            .read()
            .intents
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "intent",
                key: id.to_hex(),
            })
    }

    async fn list_intents(&self, page: Page) -> StoreResult<Vec<Intent>> {
        let tables = self.tables.read();
        let mut intents: Vec<Intent> = tables.intents.values().cloned().collect();
        intents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(intents
            .into_iter()
            .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn update_intent_status(&self, id: IntentId, status: IntentStatus) -> StoreResult<()> {
        self.take_injected()?;
        let mut tables = self.tables.write();
        let intent = tables.intents.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "intent",
            key: id.to_hex(),
        })?;
        intent.status = status;
        intent.updated_at = Utc::now();
        Ok(())
    }

    async fn create_fulfillment(&self, fulfillment: &Fulfillment) -> StoreResult<()> {
        self.take_injected()?;
        let mut tables = self.tables.write();
        if !tables.intents.contains_key(&fulfillment.intent_id) {
            return Err(StoreError::Other(format!(
                "intent {} does not exist",
                fulfillment.intent_id
            )));
        }
        let key = (fulfillment.intent_id, fulfillment.tx_hash);
        if tables.fulfillments.contains_key(&key) {
            return Err(StoreError::Duplicate {
                entity: "fulfillment",
                key: format!("{}/{}", fulfillment.intent_id, fulfillment.tx_hash),
            });
        }
        tables.fulfillments.insert(key, fulfillment.clone());
        Ok(())
    }

    async fn get_fulfillment(&self, intent_id: IntentId, tx_hash: B256) -> StoreResult<Fulfillment> {
        self.tables
            .read()
            .fulfillments
            .get(&(intent_id, tx_hash))
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "fulfillment",
                key: format!("{intent_id}/{tx_hash}"),
            })
    }

    async fn list_fulfillments(&self, intent_id: IntentId) -> StoreResult<Vec<Fulfillment>> {
        let tables = self.tables.read();
        let mut fulfillments: Vec<Fulfillment> = tables
            .fulfillments
            .values()
            .filter(|f| f.intent_id == intent_id)
            .cloned()
            .collect();
        fulfillments.sort_by_key(|f| (f.block_number, f.created_at));
        Ok(fulfillments)
    }

    async fn create_settlement(&self, settlement: &Settlement) -> StoreResult<()> {
        self.take_injected()?;
        let mut tables = self.tables.write();
        if !tables.intents.contains_key(&settlement.intent_id) {
            return Err(StoreError::Other(format!(
                "intent {} does not exist",
                settlement.intent_id
            )));
        }
        if tables.settlements.contains_key(&settlement.intent_id) {
            return Err(StoreError::Duplicate {
                entity: "settlement",
                key: settlement.intent_id.to_hex(),
            });
        }
        tables
            .settlements
            .insert(settlement.intent_id, settlement.clone());
        Ok(())
    }

    async fn get_settlement(&self, intent_id: IntentId) -> StoreResult<Settlement> {
        self.tables
            .read()
            .settlements
            .get(&intent_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "settlement",
                key: intent_id.to_hex(),
            })
    }

    async fn get_last_processed_block(
        &self,
        chain: ChainId,
        family: EventFamily,
    ) -> StoreResult<Option<Checkpoint>> {
        Ok(self
            .tables
            .read()
            .checkpoints
            .get(&(chain, family))
            .map(|&last_block| Checkpoint {
                chain,
                family,
                last_block,
            }))
    }

    async fn update_last_processed_block(
        &self,
        chain: ChainId,
        family: EventFamily,
        block: BlockNumber,
    ) -> StoreResult<()> {
        self.take_injected()?;
        let mut tables = self.tables.write();
        let entry = tables
            .checkpoints
            .entry((chain, family))
            .or_insert(BlockNumber::new(0));
        // Kept-max: concurrent advancement never regresses
        if block > *entry {
            *entry = block;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::Bytes;

    use super::*;
    use crate::types::primitives::{EthAddress, TokenAmount};

    fn intent(id: u8) -> Intent {
        Intent {
            id: IntentId::new([id; 32]),
            source_chain: ChainId::new(7001),
            destination_chain: ChainId::new(42161),
            token: EthAddress::new([0x22; 20]),
            amount: TokenAmount::parse("1000").unwrap(),
            intent_fee: TokenAmount::parse("10").unwrap(),
            recipient: EthAddress::new([0x33; 20]),
            sender: EthAddress::new([0x44; 20]),
            status: IntentStatus::Pending,
            is_call: false,
            call_data: Bytes::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let store = MemoryStore::new();
        store.create_intent(&intent(0x11)).await.unwrap();

        let loaded = store.get_intent(IntentId::new([0x11; 32])).await.unwrap();
        assert_eq!(loaded.status, IntentStatus::Pending);
    }

    #[tokio::test]
    async fn double_insert_is_duplicate() {
        let store = MemoryStore::new();
        store.create_intent(&intent(0x11)).await.unwrap();

        let err = store.create_intent(&intent(0x11)).await.unwrap_err();
        assert!(err.is_duplicate());
        assert!(err.to_string().contains("duplicate key"));
    }

    #[tokio::test]
    async fn missing_intent_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_intent(IntentId::new([0x99; 32])).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn status_update_requires_existing_row() {
        let store = MemoryStore::new();
        let err = store
            .update_intent_status(IntentId::new([0x99; 32]), IntentStatus::Settled)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn fulfillment_requires_intent() {
        let store = MemoryStore::new();
        let fulfillment = Fulfillment {
            id: uuid::Uuid::new_v4(),
            intent_id: IntentId::new([0x11; 32]),
            tx_hash: B256::repeat_byte(0xaa),
            asset: EthAddress::new([0x22; 20]),
            amount: TokenAmount::parse("1000").unwrap(),
            receiver: EthAddress::new([0x33; 20]),
            block_number: BlockNumber::new(100),
            status: crate::types::enums::FulfillmentStatus::Pending,
            is_call: false,
            call_data: Bytes::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let err = store.create_fulfillment(&fulfillment).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn list_intents_pages_newest_first() {
        let store = MemoryStore::new();
        for i in 1..=5u8 {
            let mut row = intent(i);
            row.created_at = Utc::now() + chrono::Duration::seconds(i64::from(i));
            store.create_intent(&row).await.unwrap();
        }

        let page = store
            .list_intents(Page {
                offset: 1,
                limit: 2,
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, IntentId::new([4; 32]));
        assert_eq!(page[1].id, IntentId::new([3; 32]));
    }

    #[tokio::test]
    async fn checkpoint_is_kept_max() {
        let store = MemoryStore::new();
        let chain = ChainId::new(7000);

        store
            .update_last_processed_block(chain, EventFamily::Initiated, BlockNumber::new(50))
            .await
            .unwrap();
        store
            .update_last_processed_block(chain, EventFamily::Initiated, BlockNumber::new(20))
            .await
            .unwrap();

        let checkpoint = store
            .get_last_processed_block(chain, EventFamily::Initiated)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.last_block, BlockNumber::new(50));
    }

    #[tokio::test]
    async fn concurrent_checkpoint_updates_do_not_tear() {
        let store = Arc::new(MemoryStore::new());
        let chain = ChainId::new(7000);

        let handles: Vec<_> = (0..100u64)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .update_last_processed_block(
                            chain,
                            EventFamily::Initiated,
                            BlockNumber::new(i),
                        )
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let checkpoint = store
            .get_last_processed_block(chain, EventFamily::Initiated)
            .await
            .unwrap()
            .unwrap();
        // Kept-max means the final value is exactly the largest write
        assert_eq!(checkpoint.last_block, BlockNumber::new(99));
    }

    #[tokio::test]
    async fn injected_failure_hits_next_write_only() {
        let store = MemoryStore::new();
        store.fail_next_write(StoreError::Other("disk on fire".into()));

        let err = store.create_intent(&intent(0x11)).await.unwrap_err();
        assert!(err.to_string().contains("disk on fire"));

        // Next write goes through
        store.create_intent(&intent(0x11)).await.unwrap();
    }
}
