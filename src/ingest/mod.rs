//! The event ingestion engine.
//!
//! Everything between a raw chain log and a persisted entity lives
//! here:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Ingestion Engine                           │
//! │                                                                   │
//! │   Chain ──▶ ChainSubscriber ─┐                                    │
//! │                              ├──▶ EventProcessor ──▶ IntentStore  │
//! │   Chain ──▶ CatchupFetcher ──┘        │                           │
//! │                 ▲                 EventDecoder                    │
//! │          CatchupScheduler                                         │
//! │                                                                   │
//! │   Supervisor: task ledger · subscription registry · shutdown      │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`decoder`] - raw log → typed, validated event
//! - [`processor`] - dedup, persistence, state machine
//! - [`subscriber`] - live streams (and polling for HTTP-only chains)
//! - [`fetcher`] - range sweeps over `(checkpoint, head]`
//! - [`scheduler`] - periodic self-healing sweeps
//! - [`supervisor`] - task accounting, resubscription, shutdown
//! - [`service`] - wiring

mod backoff;
pub mod decoder;
pub mod fetcher;
pub mod processor;
pub mod scheduler;
pub mod service;
pub mod subscriber;
pub mod supervisor;

pub use decoder::EventDecoder;
pub use fetcher::CatchupFetcher;
pub use processor::{EventProcessor, ProcessOutcome};
pub use scheduler::CatchupScheduler;
pub use service::IngestionService;
pub use subscriber::{ChainSubscriber, SubscriberError};
pub use supervisor::{SubscriptionKey, Supervisor};
