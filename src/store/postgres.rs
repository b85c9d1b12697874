//! PostgreSQL store adapter using SQLx.
//!
//! # Type Conversions
//!
//! PostgreSQL uses signed integers for numeric columns while the
//! domain uses unsigned types. The casts are safe here:
//! - Chain ids and block numbers won't exceed `i64::MAX`
//! - Amounts are stored as base-10 decimal strings, never aggregated
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use std::str::FromStr;

use alloy::primitives::{B256, Bytes};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::DatabaseSettings;
use crate::error::StoreError;
use crate::ports::{IntentStore, Page, StoreResult};
use crate::types::entities::{Checkpoint, Fulfillment, Intent, Settlement};
use crate::types::enums::{EventFamily, FulfillmentStatus, IntentStatus};
use crate::types::primitives::{BlockNumber, ChainId, EthAddress, IntentId, TokenAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// POSTGRES STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// PostgreSQL-backed [`IntentStore`] implementation.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be established.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout())
            .connect(&settings.url)
            .await?;
        Ok(Self { pool })
    }

    /// Run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Other(format!("migration error: {e}")))?;
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROW TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, FromRow)]
struct IntentRow {
    id: String,
    source_chain: i64,
    destination_chain: i64,
    token: String,
    amount: String,
    intent_fee: String,
    recipient: String,
    sender: String,
    status: String,
    is_call: bool,
    call_data: Vec<u8>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<IntentRow> for Intent {
    type Error = StoreError;

    fn try_from(row: IntentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id(&row.id)?,
            source_chain: ChainId::new(row.source_chain as u64),
            destination_chain: ChainId::new(row.destination_chain as u64),
            token: parse_address(&row.token)?,
            amount: parse_amount(&row.amount)?,
            intent_fee: parse_amount(&row.intent_fee)?,
            recipient: parse_address(&row.recipient)?,
            sender: parse_address(&row.sender)?,
            status: IntentStatus::from_str(&row.status)
                .map_err(|e| StoreError::Other(format!("bad status in DB: {e}")))?,
            is_call: row.is_call,
            call_data: Bytes::from(row.call_data),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct FulfillmentRow {
    id: Uuid,
    intent_id: String,
    tx_hash: String,
    asset: String,
    amount: String,
    receiver: String,
    block_number: i64,
    status: String,
    is_call: bool,
    call_data: Vec<u8>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<FulfillmentRow> for Fulfillment {
    type Error = StoreError;

    fn try_from(row: FulfillmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            intent_id: parse_id(&row.intent_id)?,
            tx_hash: parse_hash(&row.tx_hash)?,
            asset: parse_address(&row.asset)?,
            amount: parse_amount(&row.amount)?,
            receiver: parse_address(&row.receiver)?,
            block_number: BlockNumber::new(row.block_number as u64),
            status: FulfillmentStatus::from_str(&row.status)
                .map_err(|e| StoreError::Other(format!("bad status in DB: {e}")))?,
            is_call: row.is_call,
            call_data: Bytes::from(row.call_data),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SettlementRow {
    intent_id: String,
    tx_hash: String,
    asset: String,
    amount: String,
    actual_amount: String,
    paid_tip: String,
    fulfilled: bool,
    fulfiller: Option<String>,
    block_number: i64,
    is_call: bool,
    call_data: Vec<u8>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<SettlementRow> for Settlement {
    type Error = StoreError;

    fn try_from(row: SettlementRow) -> Result<Self, Self::Error> {
        Ok(Self {
            intent_id: parse_id(&row.intent_id)?,
            tx_hash: parse_hash(&row.tx_hash)?,
            asset: parse_address(&row.asset)?,
            amount: parse_amount(&row.amount)?,
            actual_amount: parse_amount(&row.actual_amount)?,
            paid_tip: parse_amount(&row.paid_tip)?,
            fulfilled: row.fulfilled,
            fulfiller: row
                .fulfiller
                .as_deref()
                .map(parse_address)
                .transpose()?,
            block_number: BlockNumber::new(row.block_number as u64),
            is_call: row.is_call,
            call_data: Bytes::from(row.call_data),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_id(s: &str) -> Result<IntentId, StoreError> {
    IntentId::from_hex(s).map_err(|e| StoreError::Other(format!("bad intent id in DB: {e}")))
}

fn parse_address(s: &str) -> Result<EthAddress, StoreError> {
    EthAddress::from_hex(s).map_err(|e| StoreError::Other(format!("bad address in DB: {e}")))
}

fn parse_amount(s: &str) -> Result<TokenAmount, StoreError> {
    TokenAmount::parse(s).map_err(|e| StoreError::Other(format!("bad amount in DB: {e}")))
}

fn parse_hash(s: &str) -> Result<B256, StoreError> {
    B256::from_str(s).map_err(|e| StoreError::Other(format!("bad hash in DB: {e}")))
}

fn hash_hex(hash: B256) -> String {
    format!("{hash:#x}")
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORE IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl IntentStore for PostgresStore {
    #[instrument(skip(self, intent), fields(id = %intent.id))]
    async fn create_intent(&self, intent: &Intent) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO intents (
                id, source_chain, destination_chain, token, amount, intent_fee,
                recipient, sender, status, is_call, call_data, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(intent.id.to_hex())
        .bind(intent.source_chain.value() as i64)
        .bind(intent.destination_chain.value() as i64)
        .bind(intent.token.to_hex())
        .bind(intent.amount.to_string())
        .bind(intent.intent_fee.to_string())
        .bind(intent.recipient.to_hex())
        .bind(intent.sender.to_hex())
        .bind(intent.status.as_str())
        .bind(intent.is_call)
        .bind(intent.call_data.as_ref())
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        debug!("Intent inserted");
        Ok(())
    }

    async fn get_intent(&self, id: IntentId) -> StoreResult<Intent> {
        let row = sqlx::query_as::<_, IntentRow>("SELECT * FROM intents WHERE id = $1")
            .bind(id.to_hex())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?
            .ok_or(StoreError::NotFound {
                entity: "intent",
                key: id.to_hex(),
            })?;
        row.try_into()
    }

    async fn list_intents(&self, page: Page) -> StoreResult<Vec<Intent>> {
        let rows = sqlx::query_as::<_, IntentRow>(
            "SELECT * FROM intents ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self), fields(id = %id, status = %status))]
    async fn update_intent_status(&self, id: IntentId, status: IntentStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE intents SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.to_hex())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "intent",
                key: id.to_hex(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, fulfillment), fields(intent = %fulfillment.intent_id))]
    async fn create_fulfillment(&self, fulfillment: &Fulfillment) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO fulfillments (
                id, intent_id, tx_hash, asset, amount, receiver, block_number,
                status, is_call, call_data, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(fulfillment.id)
        .bind(fulfillment.intent_id.to_hex())
        .bind(hash_hex(fulfillment.tx_hash))
        .bind(fulfillment.asset.to_hex())
        .bind(fulfillment.amount.to_string())
        .bind(fulfillment.receiver.to_hex())
        .bind(fulfillment.block_number.value() as i64)
        .bind(fulfillment.status.as_str())
        .bind(fulfillment.is_call)
        .bind(fulfillment.call_data.as_ref())
        .bind(fulfillment.created_at)
        .bind(fulfillment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn get_fulfillment(&self, intent_id: IntentId, tx_hash: B256) -> StoreResult<Fulfillment> {
        let row = sqlx::query_as::<_, FulfillmentRow>(
            "SELECT * FROM fulfillments WHERE intent_id = $1 AND tx_hash = $2",
        )
        .bind(intent_id.to_hex())
        .bind(hash_hex(tx_hash))
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?
        .ok_or(StoreError::NotFound {
            entity: "fulfillment",
            key: format!("{intent_id}/{tx_hash}"),
        })?;
        row.try_into()
    }

    async fn list_fulfillments(&self, intent_id: IntentId) -> StoreResult<Vec<Fulfillment>> {
        let rows = sqlx::query_as::<_, FulfillmentRow>(
            "SELECT * FROM fulfillments WHERE intent_id = $1 ORDER BY block_number, created_at",
        )
        .bind(intent_id.to_hex())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self, settlement), fields(intent = %settlement.intent_id))]
    async fn create_settlement(&self, settlement: &Settlement) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO settlements (
                intent_id, tx_hash, asset, amount, actual_amount, paid_tip,
                fulfilled, fulfiller, block_number, is_call, call_data,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(settlement.intent_id.to_hex())
        .bind(hash_hex(settlement.tx_hash))
        .bind(settlement.asset.to_hex())
        .bind(settlement.amount.to_string())
        .bind(settlement.actual_amount.to_string())
        .bind(settlement.paid_tip.to_string())
        .bind(settlement.fulfilled)
        .bind(settlement.fulfiller.map(|f| f.to_hex()))
        .bind(settlement.block_number.value() as i64)
        .bind(settlement.is_call)
        .bind(settlement.call_data.as_ref())
        .bind(settlement.created_at)
        .bind(settlement.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn get_settlement(&self, intent_id: IntentId) -> StoreResult<Settlement> {
        let row = sqlx::query_as::<_, SettlementRow>(
            "SELECT * FROM settlements WHERE intent_id = $1",
        )
        .bind(intent_id.to_hex())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?
        .ok_or(StoreError::NotFound {
            entity: "settlement",
            key: intent_id.to_hex(),
        })?;
        row.try_into()
    }

    async fn get_last_processed_block(
        &self,
        chain: ChainId,
        family: EventFamily,
    ) -> StoreResult<Option<Checkpoint>> {
        let last_block: Option<i64> = sqlx::query_scalar(
            "SELECT last_block FROM checkpoints WHERE chain_id = $1 AND family = $2",
        )
        .bind(chain.value() as i64)
        .bind(family.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(last_block.map(|block| Checkpoint {
            chain,
            family,
            last_block: BlockNumber::new(block as u64),
        }))
    }

    async fn update_last_processed_block(
        &self,
        chain: ChainId,
        family: EventFamily,
        block: BlockNumber,
    ) -> StoreResult<()> {
        // Kept-max upsert: concurrent streaming and catch-up writers
        // can never regress the row
        sqlx::query(
            r"
            INSERT INTO checkpoints (chain_id, family, last_block, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (chain_id, family) DO UPDATE
            SET last_block = GREATEST(checkpoints.last_block, EXCLUDED.last_block),
                updated_at = NOW()
            ",
        )
        .bind(chain.value() as i64)
        .bind(family.as_str())
        .bind(block.value() as i64)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn intent_row_roundtrip() {
        let row = IntentRow {
            id: "0x1111111111111111111111111111111111111111111111111111111111111111".into(),
            source_chain: 7001,
            destination_chain: 42161,
            token: "0x2222222222222222222222222222222222222222".into(),
            amount: "1000000000000000000".into(),
            intent_fee: "100000000000000000".into(),
            recipient: "0x3333333333333333333333333333333333333333".into(),
            sender: "0x4444444444444444444444444444444444444444".into(),
            status: "pending".into(),
            is_call: false,
            call_data: vec![],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let intent: Intent = row.try_into().unwrap();
        assert_eq!(intent.source_chain, ChainId::new(7001));
        assert_eq!(intent.status, IntentStatus::Pending);
        assert_eq!(intent.amount.to_string(), "1000000000000000000");
    }

    #[test]
    fn intent_row_rejects_bad_status() {
        let row = IntentRow {
            id: "0x1111111111111111111111111111111111111111111111111111111111111111".into(),
            source_chain: 7001,
            destination_chain: 42161,
            token: "0x2222222222222222222222222222222222222222".into(),
            amount: "1000".into(),
            intent_fee: "10".into(),
            recipient: "0x3333333333333333333333333333333333333333".into(),
            sender: "0x4444444444444444444444444444444444444444".into(),
            status: "finalized".into(),
            is_call: false,
            call_data: vec![],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let err = Intent::try_from(row).unwrap_err();
        assert!(err.to_string().contains("bad status"));
    }

    #[test]
    fn settlement_row_none_fulfiller() {
        let row = SettlementRow {
            intent_id: "0x1111111111111111111111111111111111111111111111111111111111111111"
                .into(),
            tx_hash: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
                .into(),
            asset: "0x2222222222222222222222222222222222222222".into(),
            amount: "1000".into(),
            actual_amount: "1000".into(),
            paid_tip: "0".into(),
            fulfilled: false,
            fulfiller: None,
            block_number: 100,
            is_call: false,
            call_data: vec![],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        let settlement: Settlement = row.try_into().unwrap();
        assert!(settlement.fulfiller.is_none());
    }

    #[test]
    fn hash_hex_is_prefixed_lowercase() {
        let hash = B256::repeat_byte(0xAB);
        let hex = hash_hex(hash);
        assert!(hex.starts_with("0x"));
        assert_eq!(hex, hex.to_lowercase());
        assert_eq!(parse_hash(&hex).unwrap(), hash);
    }
}
