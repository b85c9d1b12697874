//! Strongly-typed, validated events decoded from gateway logs.
//!
//! These are the decoder's output: raw logs become one of
//! [`InitiatedEvent`], [`FulfilledEvent`], or [`SettledEvent`], each
//! paired with [`EventMetadata`] describing where the log came from.
//! All addresses are normalized, amounts range-checked, and for
//! initiated events the transaction sender is already recovered.

use alloy::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

use super::enums::EventFamily;
use super::primitives::{ChainId, EthAddress, IntentId, TokenAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT METADATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Metadata attached to every decoded event.
///
/// Provides the on-chain coordinates of the originating log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Chain the log was observed on.
    pub chain: ChainId,
    /// Block number where the event was emitted.
    pub block_number: u64,
    /// Transaction hash that emitted this event.
    pub tx_hash: B256,
    /// Index of the log within the block.
    pub log_index: u64,
    /// Contract address that emitted this event.
    pub contract: Address,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECODED EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// A decoded `IntentInitiated(WithCall)` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatedEvent {
    /// Intent identifier.
    pub intent_id: IntentId,
    /// Token being transferred.
    pub asset: EthAddress,
    /// Raw token amount.
    pub amount: TokenAmount,
    /// Destination chain id.
    pub target_chain: ChainId,
    /// Opaque receiver payload (at least 20 bytes).
    pub receiver: Bytes,
    /// Fulfiller fee.
    pub tip: TokenAmount,
    /// Transaction signer that opened the intent.
    pub sender: EthAddress,
    /// Whether this is the `WithCall` variant.
    pub is_call: bool,
    /// Destination call payload; non-empty iff `is_call`.
    pub call_data: Bytes,
}

/// A decoded `IntentFulfilled(WithCall)` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfilledEvent {
    /// Intent being fulfilled.
    pub intent_id: IntentId,
    /// Delivered token.
    pub asset: EthAddress,
    /// Delivered amount.
    pub amount: TokenAmount,
    /// Recipient of the delivery.
    pub receiver: EthAddress,
    /// Whether this is the `WithCall` variant.
    pub is_call: bool,
    /// Destination call payload; non-empty iff `is_call`.
    pub call_data: Bytes,
}

/// A decoded `IntentSettled(WithCall)` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledEvent {
    /// Intent being settled.
    pub intent_id: IntentId,
    /// Settled token.
    pub asset: EthAddress,
    /// Intent amount.
    pub amount: TokenAmount,
    /// Final recipient.
    pub receiver: EthAddress,
    /// Whether a fulfiller was reimbursed.
    pub fulfilled: bool,
    /// Reimbursed fulfiller; zero address when `fulfilled` is false.
    pub fulfiller: EthAddress,
    /// Amount actually moved.
    pub actual_amount: TokenAmount,
    /// Tip paid out.
    pub paid_tip: TokenAmount,
    /// Whether this is the `WithCall` variant.
    pub is_call: bool,
    /// Destination call payload; non-empty iff `is_call`.
    pub call_data: Bytes,
}

// ═══════════════════════════════════════════════════════════════════════════════
// UNIFIED EVENT ENUM
// ═══════════════════════════════════════════════════════════════════════════════

/// Unified enum over the three decoded event families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
#[non_exhaustive]
pub enum IntentEvent {
    /// Intent opened on the source chain.
    Initiated(InitiatedEvent),
    /// Delivery performed on the destination chain.
    Fulfilled(FulfilledEvent),
    /// Terminal accounting on the destination chain.
    Settled(SettledEvent),
}

impl IntentEvent {
    /// Family this event belongs to.
    #[must_use]
    pub const fn family(&self) -> EventFamily {
        match self {
            Self::Initiated(_) => EventFamily::Initiated,
            Self::Fulfilled(_) => EventFamily::Fulfilled,
            Self::Settled(_) => EventFamily::Settled,
        }
    }

    /// Intent id the event refers to.
    #[must_use]
    pub const fn intent_id(&self) -> IntentId {
        match self {
            Self::Initiated(e) => e.intent_id,
            Self::Fulfilled(e) => e.intent_id,
            Self::Settled(e) => e.intent_id,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_settled() -> SettledEvent {
        SettledEvent {
            intent_id: IntentId::new([0x11; 32]),
            asset: EthAddress::new([0x22; 20]),
            amount: TokenAmount::parse("1000").unwrap(),
            receiver: EthAddress::new([0x33; 20]),
            fulfilled: true,
            fulfiller: EthAddress::new([0x44; 20]),
            actual_amount: TokenAmount::parse("990").unwrap(),
            paid_tip: TokenAmount::parse("10").unwrap(),
            is_call: false,
            call_data: Bytes::new(),
        }
    }

    #[test]
    fn family_mapping() {
        let event = IntentEvent::Settled(sample_settled());
        assert_eq!(event.family(), EventFamily::Settled);
        assert_eq!(event.intent_id(), IntentId::new([0x11; 32]));
    }

    #[test]
    fn serde_tagging() {
        let event = IntentEvent::Settled(sample_settled());
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.starts_with("{\"Settled\""));

        let back: IntentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
