//! Domain entities for store persistence.
//!
//! Entities are constructed from decoded events by the processor and
//! written through the store port. [`Intent`] is the aggregate root;
//! fulfillments and settlements reference it by id.

use alloy::primitives::{B256, Bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EventFamily, FulfillmentStatus, IntentStatus};
use super::events::{EventMetadata, FulfilledEvent, InitiatedEvent, SettledEvent};
use super::primitives::{BlockNumber, ChainId, EthAddress, IntentId, InvalidAddress, TokenAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// INTENT
// ═══════════════════════════════════════════════════════════════════════════════

/// A user's cross-chain transfer request.
///
/// Created on the first *Initiated* event and mutated only by the
/// processor. `status` transitions are forward-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// 32-byte identifier; primary key.
    pub id: IntentId,
    /// Chain the intent was opened on.
    pub source_chain: ChainId,
    /// Chain tokens are delivered to.
    pub destination_chain: ChainId,
    /// Token being transferred.
    pub token: EthAddress,
    /// Transfer amount in raw units.
    pub amount: TokenAmount,
    /// Fee offered to fulfillers.
    pub intent_fee: TokenAmount,
    /// Recipient address on the destination chain.
    pub recipient: EthAddress,
    /// Transaction signer that opened the intent.
    pub sender: EthAddress,
    /// Lifecycle status.
    pub status: IntentStatus,
    /// Whether the intent carries a destination call.
    pub is_call: bool,
    /// Destination call payload; non-empty iff `is_call`.
    pub call_data: Bytes,
    /// Block time of the originating log (wall clock if unavailable).
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Intent {
    /// Build a pending intent from a decoded initiated event.
    ///
    /// The recipient address is the trailing 20 bytes of the receiver
    /// payload (the decoder guarantees at least 20 bytes).
    ///
    /// # Errors
    /// Returns `InvalidAddress` if the receiver payload is shorter than
    /// an address, which the decoder should have rejected.
    pub fn from_initiated(
        event: &InitiatedEvent,
        meta: &EventMetadata,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, InvalidAddress> {
        Ok(Self {
            id: event.intent_id,
            source_chain: meta.chain,
            destination_chain: event.target_chain,
            token: event.asset,
            amount: event.amount,
            intent_fee: event.tip,
            recipient: EthAddress::from_receiver_bytes(&event.receiver)?,
            sender: event.sender,
            status: IntentStatus::Pending,
            is_call: event.is_call,
            call_data: event.call_data.clone(),
            created_at: timestamp,
            updated_at: timestamp,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FULFILLMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// A fulfiller's delivery on the destination chain.
///
/// Multiple fulfillments per intent are allowed; the natural key for
/// de-duplication is `(intent_id, tx_hash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    /// Row identity.
    pub id: Uuid,
    /// Intent this fulfillment belongs to.
    pub intent_id: IntentId,
    /// Transaction that performed the delivery.
    pub tx_hash: B256,
    /// Delivered token.
    pub asset: EthAddress,
    /// Delivered amount.
    pub amount: TokenAmount,
    /// Recipient of the delivery.
    pub receiver: EthAddress,
    /// Block the delivery landed in.
    pub block_number: BlockNumber,
    /// Settlement coverage status.
    pub status: FulfillmentStatus,
    /// Whether the delivery executed a destination call.
    pub is_call: bool,
    /// Call payload; non-empty iff `is_call`.
    pub call_data: Bytes,
    /// Block time of the originating log (wall clock if unavailable).
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Fulfillment {
    /// Build a pending fulfillment from a decoded fulfilled event.
    #[must_use]
    pub fn from_event(
        event: &FulfilledEvent,
        meta: &EventMetadata,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent_id: event.intent_id,
            tx_hash: meta.tx_hash,
            asset: event.asset,
            amount: event.amount,
            receiver: event.receiver,
            block_number: BlockNumber::new(meta.block_number),
            status: FulfillmentStatus::Pending,
            is_call: event.is_call,
            call_data: event.call_data.clone(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SETTLEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Terminal accounting record for an intent. One per intent; the
/// intent id is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Intent this settlement closes; primary key.
    pub intent_id: IntentId,
    /// Transaction that performed the settlement.
    pub tx_hash: B256,
    /// Settled token.
    pub asset: EthAddress,
    /// Intent amount.
    pub amount: TokenAmount,
    /// Amount actually moved.
    pub actual_amount: TokenAmount,
    /// Tip paid out.
    pub paid_tip: TokenAmount,
    /// Whether a fulfiller was reimbursed.
    pub fulfilled: bool,
    /// Reimbursed fulfiller; `None` when the intent completed without one.
    pub fulfiller: Option<EthAddress>,
    /// Block the settlement landed in.
    pub block_number: BlockNumber,
    /// Whether the settlement covered a destination call.
    pub is_call: bool,
    /// Call payload; non-empty iff `is_call`.
    pub call_data: Bytes,
    /// Block time of the originating log (wall clock if unavailable).
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// Build a settlement from a decoded settled event.
    ///
    /// A zero fulfiller address is normalized to `None`.
    #[must_use]
    pub fn from_event(
        event: &SettledEvent,
        meta: &EventMetadata,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let fulfiller = if event.fulfiller.is_zero() {
            None
        } else {
            Some(event.fulfiller)
        };

        Self {
            intent_id: event.intent_id,
            tx_hash: meta.tx_hash,
            asset: event.asset,
            amount: event.amount,
            actual_amount: event.actual_amount,
            paid_tip: event.paid_tip,
            fulfilled: event.fulfilled,
            fulfiller,
            block_number: BlockNumber::new(meta.block_number),
            is_call: event.is_call,
            call_data: event.call_data.clone(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHECKPOINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Last fully processed block for a `(chain, family)` pair.
///
/// Monotonically non-decreasing; persisted only after all logs up to
/// and including `last_block` are durably written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Chain the checkpoint tracks.
    pub chain: ChainId,
    /// Event family the checkpoint tracks.
    pub family: EventFamily,
    /// Highest fully-processed block.
    pub last_block: BlockNumber,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
