//! Intent Indexer
//!
//! A multi-chain event ingestion and lifecycle coordinator for the
//! cross-chain intent protocol. It watches the gateway contracts on
//! every configured chain for the three intent event families
//! (`IntentInitiated`, `IntentFulfilled`, `IntentSettled`, each with a
//! `WithCall` variant), decodes and validates each log, persists
//! Intent / Fulfillment / Settlement entities, and drives the intent
//! state machine to its terminal state.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        INGESTION ENGINE                           │
//! │                                                                   │
//! │  Chain ──▶ Subscriber ──┐                                         │
//! │                         ├──▶ Processor ──▶ Store                  │
//! │  Chain ──▶ Fetcher ─────┘       │                                 │
//! │              ▲               Decoder                              │
//! │          Scheduler                                                │
//! │                                                                   │
//! │  Supervisor: task ledger · subscriptions · shutdown               │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two ingestion paths cover every log between the persisted
//! checkpoint and the chain head: live subscriptions (or polling on
//! HTTP-only chains) and periodic catch-up sweeps. Idempotent writes
//! and a forward-only state machine make their overlap safe.
//!
//! # Modules
//!
//! - [`types`] - Domain types (primitives, enums, events, entities)
//! - [`error`] - Layered error types
//! - [`config`] - Configuration loading and validation
//! - [`abi`] - ABI bindings for the intent gateway
//! - [`ports`] - Traits the engine consumes (store, chain, clock, sampler)
//! - [`chain`] - Alloy-backed chain clients and the resolver
//! - [`ingest`] - The ingestion engine itself
//! - [`store`] - Store adapters (PostgreSQL, in-memory)
//! - [`metrics`] - Counter sampling and chain naming

pub mod abi;
pub mod chain;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod ports;
pub mod store;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}
