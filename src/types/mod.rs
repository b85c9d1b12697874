//! Domain types for the intent indexer.
//!
//! Organized in layers:
//!
//! - [`primitives`] - Validated newtypes (ids, addresses, amounts, blocks)
//! - [`enums`] - Lifecycle enumerations and the status DAG
//! - [`events`] - Decoded, validated on-chain events
//! - [`entities`] - Store entities built from events

pub mod entities;
pub mod enums;
pub mod events;
pub mod primitives;

pub use entities::{Checkpoint, Fulfillment, Intent, Settlement};
pub use enums::{EventFamily, FulfillmentStatus, IntentStatus};
pub use events::{EventMetadata, FulfilledEvent, InitiatedEvent, IntentEvent, SettledEvent};
pub use primitives::{BlockNumber, ChainId, EthAddress, IntentId, TokenAmount};
