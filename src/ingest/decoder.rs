//! Log decoding and semantic validation.
//!
//! The [`EventDecoder`] turns raw logs (topics + data) into typed,
//! validated intent events. It is parameterized by ABI JSON text at
//! construction: the JSON's event selectors are cross-checked against
//! the compiled bindings, so a deployment shipping a drifted ABI fails
//! at startup instead of silently skipping every log.
//!
//! Decoding is two-phase:
//!
//! 1. [`EventDecoder::decode_log`] - pure: shape check, signature match,
//!    strict-order field parse, normalization, semantic validation
//! 2. [`EventDecoder::decode`] - async: additionally recovers the
//!    transaction sender for *Initiated* events through the chain client
//!
//! # Semantic validations
//!
//! Performed here, not in the processor: target/source chains non-zero,
//! recognized, and distinct; amount in `(0, 10^27]`; receiver payload at
//! least 20 bytes.

use std::collections::{HashMap, HashSet};

use alloy::json_abi::JsonAbi;
use alloy::primitives::{B256, Log as PrimitiveLog};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use tracing::instrument;

use crate::abi::intent_gateway;
use crate::error::{AppError, DecodeError, Result, ValidationError};
use crate::ports::ChainClient;
use crate::types::enums::EventFamily;
use crate::types::events::{
    EventMetadata, FulfilledEvent, InitiatedEvent, IntentEvent, SettledEvent,
};
use crate::types::primitives::{ChainId, EthAddress, TokenAmount};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum topics any gateway event carries (signature + two indexed).
pub const MIN_TOPICS: usize = 3;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT KIND TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Internal dispatch key: family plus call-variant flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EventKind {
    family: EventFamily,
    with_call: bool,
}

/// The six expected events: ABI name, kind, and compiled selector.
fn expected_events() -> [(&'static str, EventKind, B256); 6] {
    [
        (
            "IntentInitiated",
            EventKind {
                family: EventFamily::Initiated,
                with_call: false,
            },
            intent_gateway::IntentInitiated::SIGNATURE_HASH,
        ),
        (
            "IntentInitiatedWithCall",
            EventKind {
                family: EventFamily::Initiated,
                with_call: true,
            },
            intent_gateway::IntentInitiatedWithCall::SIGNATURE_HASH,
        ),
        (
            "IntentFulfilled",
            EventKind {
                family: EventFamily::Fulfilled,
                with_call: false,
            },
            intent_gateway::IntentFulfilled::SIGNATURE_HASH,
        ),
        (
            "IntentFulfilledWithCall",
            EventKind {
                family: EventFamily::Fulfilled,
                with_call: true,
            },
            intent_gateway::IntentFulfilledWithCall::SIGNATURE_HASH,
        ),
        (
            "IntentSettled",
            EventKind {
                family: EventFamily::Settled,
                with_call: false,
            },
            intent_gateway::IntentSettled::SIGNATURE_HASH,
        ),
        (
            "IntentSettledWithCall",
            EventKind {
                family: EventFamily::Settled,
                with_call: true,
            },
            intent_gateway::IntentSettledWithCall::SIGNATURE_HASH,
        ),
    ]
}

/// Topic0 values for a family's plain and `WithCall` variants.
///
/// Subscribers use these to build their log filters.
#[must_use]
pub fn family_signatures(family: EventFamily) -> [B256; 2] {
    match family {
        EventFamily::Initiated => [
            intent_gateway::IntentInitiated::SIGNATURE_HASH,
            intent_gateway::IntentInitiatedWithCall::SIGNATURE_HASH,
        ],
        EventFamily::Fulfilled => [
            intent_gateway::IntentFulfilled::SIGNATURE_HASH,
            intent_gateway::IntentFulfilledWithCall::SIGNATURE_HASH,
        ],
        EventFamily::Settled => [
            intent_gateway::IntentSettled::SIGNATURE_HASH,
            intent_gateway::IntentSettledWithCall::SIGNATURE_HASH,
        ],
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RAW EVENTS (pre sender recovery)
// ═══════════════════════════════════════════════════════════════════════════════

/// Decoded initiated event before sender recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedParts {
    /// Intent identifier.
    pub intent_id: crate::types::primitives::IntentId,
    /// Token being transferred.
    pub asset: EthAddress,
    /// Raw token amount.
    pub amount: TokenAmount,
    /// Destination chain id.
    pub target_chain: ChainId,
    /// Opaque receiver payload.
    pub receiver: alloy::primitives::Bytes,
    /// Fulfiller fee.
    pub tip: TokenAmount,
    /// Whether this is the `WithCall` variant.
    pub is_call: bool,
    /// Destination call payload.
    pub call_data: alloy::primitives::Bytes,
}

impl InitiatedParts {
    /// Attach the recovered transaction sender.
    #[must_use]
    pub fn with_sender(self, sender: EthAddress) -> InitiatedEvent {
        InitiatedEvent {
            intent_id: self.intent_id,
            asset: self.asset,
            amount: self.amount,
            target_chain: self.target_chain,
            receiver: self.receiver,
            tip: self.tip,
            sender,
            is_call: self.is_call,
            call_data: self.call_data,
        }
    }
}

/// Output of the pure decoding phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawIntentEvent {
    /// Initiated event awaiting sender recovery.
    Initiated(InitiatedParts),
    /// Fully decoded fulfilled event.
    Fulfilled(FulfilledEvent),
    /// Fully decoded settled event.
    Settled(SettledEvent),
}

impl RawIntentEvent {
    /// Family of the decoded event.
    #[must_use]
    pub const fn family(&self) -> EventFamily {
        match self {
            Self::Initiated(_) => EventFamily::Initiated,
            Self::Fulfilled(_) => EventFamily::Fulfilled,
            Self::Settled(_) => EventFamily::Settled,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT DECODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Decoder for gateway logs, parameterized by ABI JSON.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    /// topic0 → event kind dispatch table, built from the ABI.
    signatures: HashMap<B256, EventKind>,
    /// Chains the deployment recognizes.
    supported: HashSet<ChainId>,
}

impl EventDecoder {
    /// Build a decoder from ABI JSON text and the supported-chain set.
    ///
    /// Every expected event must be present in the ABI and its selector
    /// must match the compiled bindings.
    ///
    /// # Errors
    ///
    /// Returns an initialization error if the JSON does not parse, an
    /// event is missing, or a selector mismatches.
    pub fn new(
        abi_json: &str,
        supported_chains: impl IntoIterator<Item = ChainId>,
    ) -> Result<Self> {
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|e| AppError::Initialization(format!("invalid ABI JSON: {e}")))?;

        let mut signatures = HashMap::with_capacity(6);
        for (name, kind, compiled) in expected_events() {
            let event = abi
                .events
                .get(name)
                .and_then(|overloads| overloads.first())
                .ok_or_else(|| {
                    AppError::Initialization(format!("ABI is missing event {name}"))
                })?;

            let selector = event.selector();
            if selector != compiled {
                return Err(AppError::Initialization(format!(
                    "ABI selector for {name} does not match the compiled schema"
                )));
            }
            signatures.insert(selector, kind);
        }

        Ok(Self {
            signatures,
            supported: supported_chains.into_iter().collect(),
        })
    }

    /// Whether a chain id is in the supported set.
    #[must_use]
    pub fn is_supported(&self, chain: ChainId) -> bool {
        self.supported.contains(&chain)
    }

    /// Family of a log's `topic0`, if known.
    #[must_use]
    pub fn family_of(&self, topic0: &B256) -> Option<EventFamily> {
        self.signatures.get(topic0).map(|k| k.family)
    }

    /// Pure decoding phase: shape, signature, fields, validation.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::Shape`] on too-few topics or malformed fields
    /// - [`DecodeError::UnknownEvent`] on an unrecognized signature
    /// - [`DecodeError::MissingField`] when the log lacks chain coordinates
    /// - [`ValidationError`] on semantic invariant violations
    #[instrument(skip(self, log), fields(chain = %chain, topic0 = ?log.topics().first()))]
    pub fn decode_log(&self, chain: ChainId, log: &Log) -> Result<(RawIntentEvent, EventMetadata)> {
        let topics = log.topics();
        if topics.len() < MIN_TOPICS {
            return Err(DecodeError::Shape(format!(
                "expected at least {MIN_TOPICS} topics, got {}",
                topics.len()
            ))
            .into());
        }

        let topic0 = topics[0];
        let kind = *self
            .signatures
            .get(&topic0)
            .ok_or_else(|| DecodeError::UnknownEvent(topic0.to_string()))?;

        let meta = Self::metadata(chain, log)?;

        let event = match kind.family {
            EventFamily::Initiated => {
                RawIntentEvent::Initiated(Self::decode_initiated(&log.inner, kind.with_call)?)
            }
            EventFamily::Fulfilled => {
                RawIntentEvent::Fulfilled(Self::decode_fulfilled(&log.inner, kind.with_call)?)
            }
            EventFamily::Settled => {
                RawIntentEvent::Settled(Self::decode_settled(&log.inner, kind.with_call)?)
            }
        };

        self.validate(chain, &event)?;

        Ok((event, meta))
    }

    /// Full decoding: pure phase plus sender recovery for *Initiated*.
    ///
    /// The client must be the one for the chain the log was observed on;
    /// the transaction lives there.
    ///
    /// # Errors
    ///
    /// Everything [`Self::decode_log`] returns, plus
    /// [`DecodeError::SenderRecovery`] when the transaction cannot be
    /// fetched or carries no recoverable signer.
    pub async fn decode(
        &self,
        chain: ChainId,
        log: &Log,
        client: &dyn ChainClient,
    ) -> Result<(IntentEvent, EventMetadata)> {
        let (raw, meta) = self.decode_log(chain, log)?;

        let event = match raw {
            RawIntentEvent::Initiated(parts) => {
                let tx_hash = meta.tx_hash;
                let info = client
                    .transaction_by_hash(tx_hash)
                    .await
                    .map_err(|e| DecodeError::SenderRecovery {
                        tx_hash: tx_hash.to_string(),
                        reason: e.to_string(),
                    })?
                    .ok_or_else(|| DecodeError::SenderRecovery {
                        tx_hash: tx_hash.to_string(),
                        reason: "transaction not found".into(),
                    })?;
                IntentEvent::Initiated(parts.with_sender(info.sender.into()))
            }
            RawIntentEvent::Fulfilled(event) => IntentEvent::Fulfilled(event),
            RawIntentEvent::Settled(event) => IntentEvent::Settled(event),
        };

        Ok((event, meta))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Per-family field decoding (strict declared order via SolEvent)
    // ───────────────────────────────────────────────────────────────────────────

    fn decode_initiated(log: &PrimitiveLog, with_call: bool) -> Result<InitiatedParts> {
        let (intent_id, asset, amount, target_chain, receiver, tip, call_data) = if with_call {
            let ev = Self::decode_event::<intent_gateway::IntentInitiatedWithCall>(log)?;
            (
                ev.intentId, ev.asset, ev.amount, ev.targetChain, ev.receiver, ev.tip, ev.data,
            )
        } else {
            let ev = Self::decode_event::<intent_gateway::IntentInitiated>(log)?;
            (
                ev.intentId,
                ev.asset,
                ev.amount,
                ev.targetChain,
                ev.receiver,
                ev.tip,
                alloy::primitives::Bytes::new(),
            )
        };

        let target_chain = u64::try_from(target_chain)
            .map_err(|_| DecodeError::Shape("targetChain exceeds u64".into()))?;

        Ok(InitiatedParts {
            intent_id: intent_id.into(),
            asset: asset.into(),
            amount: amount.into(),
            target_chain: ChainId::new(target_chain),
            receiver,
            tip: tip.into(),
            is_call: with_call,
            call_data,
        })
    }

    fn decode_fulfilled(log: &PrimitiveLog, with_call: bool) -> Result<FulfilledEvent> {
        let (intent_id, asset, amount, receiver, call_data) = if with_call {
            let ev = Self::decode_event::<intent_gateway::IntentFulfilledWithCall>(log)?;
            (ev.intentId, ev.asset, ev.amount, ev.receiver, ev.data)
        } else {
            let ev = Self::decode_event::<intent_gateway::IntentFulfilled>(log)?;
            (
                ev.intentId,
                ev.asset,
                ev.amount,
                ev.receiver,
                alloy::primitives::Bytes::new(),
            )
        };

        Ok(FulfilledEvent {
            intent_id: intent_id.into(),
            asset: asset.into(),
            amount: amount.into(),
            receiver: receiver.into(),
            is_call: with_call,
            call_data,
        })
    }

    fn decode_settled(log: &PrimitiveLog, with_call: bool) -> Result<SettledEvent> {
        let (intent_id, asset, amount, receiver, fulfilled, fulfiller, actual, tip, call_data) =
            if with_call {
                let ev = Self::decode_event::<intent_gateway::IntentSettledWithCall>(log)?;
                (
                    ev.intentId,
                    ev.asset,
                    ev.amount,
                    ev.receiver,
                    ev.fulfilled,
                    ev.fulfiller,
                    ev.actualAmount,
                    ev.paidTip,
                    ev.data,
                )
            } else {
                let ev = Self::decode_event::<intent_gateway::IntentSettled>(log)?;
                (
                    ev.intentId,
                    ev.asset,
                    ev.amount,
                    ev.receiver,
                    ev.fulfilled,
                    ev.fulfiller,
                    ev.actualAmount,
                    ev.paidTip,
                    alloy::primitives::Bytes::new(),
                )
            };

        Ok(SettledEvent {
            intent_id: intent_id.into(),
            asset: asset.into(),
            amount: amount.into(),
            receiver: receiver.into(),
            fulfilled,
            fulfiller: fulfiller.into(),
            actual_amount: actual.into(),
            paid_tip: tip.into(),
            is_call: with_call,
            call_data,
        })
    }

    /// Decode a log into a strongly-typed event.
    fn decode_event<Ev: SolEvent>(log: &PrimitiveLog) -> Result<Ev> {
        let decoded = Ev::decode_log(log).map_err(|e| {
            DecodeError::Shape(format!("failed to decode {}: {e}", Ev::SIGNATURE))
        })?;
        Ok(decoded.data)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Metadata & validation
    // ───────────────────────────────────────────────────────────────────────────

    fn metadata(chain: ChainId, log: &Log) -> Result<EventMetadata> {
        let block_number = log
            .block_number
            .ok_or(DecodeError::MissingField("block_number"))?;
        let tx_hash = log
            .transaction_hash
            .ok_or(DecodeError::MissingField("transaction_hash"))?;
        let log_index = log.log_index.ok_or(DecodeError::MissingField("log_index"))?;

        Ok(EventMetadata {
            chain,
            block_number,
            tx_hash,
            log_index,
            contract: log.address(),
        })
    }

    fn validate(&self, chain: ChainId, event: &RawIntentEvent) -> Result<()> {
        if chain.is_zero() {
            return Err(ValidationError::ZeroChain.into());
        }
        if !self.supported.contains(&chain) {
            return Err(ValidationError::UnsupportedChain(chain.value()).into());
        }

        match event {
            RawIntentEvent::Initiated(parts) => {
                if parts.target_chain.is_zero() {
                    return Err(ValidationError::ZeroChain.into());
                }
                if !self.supported.contains(&parts.target_chain) {
                    return Err(
                        ValidationError::UnsupportedChain(parts.target_chain.value()).into()
                    );
                }
                if parts.target_chain == chain {
                    return Err(ValidationError::SameChain(chain.value()).into());
                }
                if !parts.amount.is_valid_intent_amount() {
                    return Err(
                        ValidationError::AmountOutOfRange(parts.amount.to_string()).into()
                    );
                }
                if parts.receiver.len() < 20 {
                    return Err(ValidationError::ReceiverTooShort(parts.receiver.len()).into());
                }
            }
            RawIntentEvent::Fulfilled(event) => {
                if !event.amount.is_valid_intent_amount() {
                    return Err(
                        ValidationError::AmountOutOfRange(event.amount.to_string()).into()
                    );
                }
            }
            RawIntentEvent::Settled(event) => {
                if !event.amount.is_valid_intent_amount() {
                    return Err(
                        ValidationError::AmountOutOfRange(event.amount.to_string()).into()
                    );
                }
            }
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
