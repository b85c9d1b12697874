//! Configuration loading and validation for the intent indexer.
//!
//! Settings are loaded in layers:
//! 1. Built-in defaults
//! 2. `config/default.toml`
//! 3. `config/{environment}.toml`
//! 4. `INDEXER_`-prefixed environment variables
//!
//! The chain list carries no default; deployments must declare every
//! supported chain with its endpoints, gateway address, and bootstrap
//! block.

mod settings;

pub use settings::{
    CatchupSettings, ChainSettings, DatabaseSettings, FetchSettings, LoggingSettings,
    MetricsSettings, Settings,
};
