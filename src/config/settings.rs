//! Settings structs and loading logic.
//!
//! All scalar settings have sensible defaults and can be overridden via
//! environment variables or configuration files. The chain list has no
//! default: every deployment must name its supported chains explicitly.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::types::primitives::{BlockNumber, ChainId};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Supported chains and their endpoints.
    pub chains: Vec<ChainSettings>,
    /// Periodic catch-up sweep configuration.
    pub catchup: CatchupSettings,
    /// Range-fetch retry configuration.
    pub fetch: FetchSettings,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Metrics configuration.
    pub metrics: MetricsSettings,
    /// Service shutdown deadline in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Settings {
    /// Load settings from configuration files and environment variables.
    ///
    /// Files are loaded in this order (later overrides earlier):
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (if exists)
    /// 3. Environment variables with `INDEXER_` prefix
    ///
    /// # Arguments
    /// * `environment` - Environment name (e.g., "development", "production")
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration is invalid or cannot be loaded.
    pub fn load(environment: &str) -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("catchup.interval_mins", 5)?
            .set_default("catchup.timeout_mins", 5)?
            .set_default("catchup.lookback_blocks", 1000)?
            .set_default("fetch.max_retries", 5)?
            .set_default("fetch.base_delay_ms", 1000)?
            .set_default("database.url", "postgres://localhost/intents")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout_ms", 5000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.host", "0.0.0.0")?
            .set_default("metrics.port", 9090)?
            .set_default("shutdown_timeout_secs", 30)?
            // Load default configuration file
            .add_source(File::with_name(&format!("{config_dir}/default")).required(false))
            // Load environment-specific file
            .add_source(File::with_name(&format!("{config_dir}/{environment}")).required(false))
            // Override with environment variables (INDEXER_ prefix)
            .add_source(
                Environment::with_prefix("INDEXER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a specific file path.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    /// Validate settings and return any validation errors.
    ///
    /// # Errors
    /// Returns a list of validation error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.chains.is_empty() {
            errors.push("chains cannot be empty".into());
        }
        for chain in &self.chains {
            if chain.chain_id == 0 {
                errors.push("chain_id must be non-zero".into());
            }
            if chain.rpc_url.is_empty() {
                errors.push(format!("chain {}: rpc_url cannot be empty", chain.chain_id));
            }
            if chain
                .contract_address
                .parse::<alloy::primitives::Address>()
                .is_err()
            {
                errors.push(format!(
                    "chain {}: invalid contract_address '{}'",
                    chain.chain_id, chain.contract_address
                ));
            }
        }
        let mut ids: Vec<u64> = self.chains.iter().map(|c| c.chain_id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.chains.len() {
            errors.push("chain ids must be unique".into());
        }

        if self.catchup.interval_mins == 0 {
            errors.push("catchup.interval_mins must be non-zero".into());
        }
        if self.catchup.timeout_mins == 0 {
            errors.push("catchup.timeout_mins must be non-zero".into());
        }
        if self.fetch.max_retries == 0 {
            errors.push("fetch.max_retries must be non-zero".into());
        }

        if self.database.url.is_empty() {
            errors.push("database.url cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be non-zero".into());
        }
        if self.database.min_connections > self.database.max_connections {
            errors.push("database.min_connections cannot exceed max_connections".into());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Supported chain ids.
    #[must_use]
    pub fn supported_chains(&self) -> Vec<ChainId> {
        self.chains
            .iter()
            .map(|c| ChainId::new(c.chain_id))
            .collect()
    }

    /// Look up the settings block for a chain.
    #[must_use]
    pub fn chain(&self, id: ChainId) -> Option<&ChainSettings> {
        self.chains.iter().find(|c| c.chain_id == id.value())
    }

    /// Shutdown deadline as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Per-chain endpoint and contract configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSettings {
    /// Chain id.
    pub chain_id: u64,
    /// HTTP RPC endpoint URL.
    pub rpc_url: String,
    /// WebSocket RPC endpoint URL. Absent for HTTP-only chains, which
    /// fall back to the polling subscriber.
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Intent gateway contract address.
    pub contract_address: String,
    /// Block to bootstrap checkpoints from when none is persisted.
    #[serde(default)]
    pub default_block: u64,
    /// Polling interval for HTTP-only chains, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_poll_interval_ms() -> u64 {
    5000
}

impl ChainSettings {
    /// Typed chain id.
    #[must_use]
    pub const fn id(&self) -> ChainId {
        ChainId::new(self.chain_id)
    }

    /// Typed bootstrap block.
    #[must_use]
    pub const fn default_block(&self) -> BlockNumber {
        BlockNumber::new(self.default_block)
    }

    /// Parsed gateway contract address.
    ///
    /// # Errors
    /// Returns an error string if the configured address is invalid.
    pub fn contract(&self) -> Result<alloy::primitives::Address, String> {
        self.contract_address
            .parse()
            .map_err(|e| format!("invalid contract address '{}': {e}", self.contract_address))
    }

    /// Polling interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Whether the chain supports push streaming.
    #[must_use]
    pub const fn supports_streaming(&self) -> bool {
        self.ws_url.is_some()
    }
}

/// Periodic catch-up sweep configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CatchupSettings {
    /// Minutes between sweeps.
    pub interval_mins: u64,
    /// Per-sweep timeout in minutes.
    pub timeout_mins: u64,
    /// How many blocks back from head each sweep covers.
    pub lookback_blocks: u64,
}

impl CatchupSettings {
    /// Sweep interval as a `Duration`.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_mins * 60)
    }

    /// Per-sweep timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_mins * 60)
    }
}

/// Range-fetch retry configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FetchSettings {
    /// Maximum retry attempts for a failing range query.
    pub max_retries: u32,
    /// Base backoff delay in milliseconds (doubles per attempt, capped at 30 s).
    pub base_delay_ms: u64,
}

impl FetchSettings {
    /// Base backoff delay as a `Duration`.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum connections in the pool.
    pub max_connections: u32,
    /// Minimum connections to maintain.
    pub min_connections: u32,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl DatabaseSettings {
    /// Connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,
    /// Log format (json, pretty).
    pub format: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Whether the Prometheus exporter is enabled.
    pub enabled: bool,
    /// Host to bind the exporter to.
    pub host: String,
    /// Exporter port.
    pub port: u16,
}

impl MetricsSettings {
    /// Exporter socket address string.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn create_valid_settings() -> Settings {
        Settings {
            chains: vec![
                ChainSettings {
                    chain_id: 7001,
                    rpc_url: "http://localhost:8545".into(),
                    ws_url: Some("ws://localhost:8546".into()),
                    contract_address: "0x0000000000000000000000000000000000000001".into(),
                    default_block: 100,
                    poll_interval_ms: 5000,
                },
                ChainSettings {
                    chain_id: 42161,
                    rpc_url: "http://localhost:9545".into(),
                    ws_url: None,
                    contract_address: "0x0000000000000000000000000000000000000002".into(),
                    default_block: 0,
                    poll_interval_ms: 5000,
                },
            ],
            catchup: CatchupSettings {
                interval_mins: 5,
                timeout_mins: 5,
                lookback_blocks: 1000,
            },
            fetch: FetchSettings {
                max_retries: 5,
                base_delay_ms: 1000,
            },
            database: DatabaseSettings {
                url: "postgres://localhost/test".into(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_ms: 5000,
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: "json".into(),
            },
            metrics: MetricsSettings {
                enabled: true,
                host: "0.0.0.0".into(),
                port: 9090,
            },
            shutdown_timeout_secs: 30,
        }
    }

    #[test]
    fn valid_settings_pass() {
        assert!(create_valid_settings().validate().is_ok());
    }

    #[test]
    fn validation_catches_empty_chains() {
        let mut settings = create_valid_settings();
        settings.chains.clear();
        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("chains")));
    }

    #[test]
    fn validation_catches_zero_chain_id() {
        let mut settings = create_valid_settings();
        settings.chains[0].chain_id = 0;
        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("non-zero")));
    }

    #[test]
    fn validation_catches_duplicate_chain_ids() {
        let mut settings = create_valid_settings();
        settings.chains[1].chain_id = 7001;
        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unique")));
    }

    #[test]
    fn validation_catches_bad_contract_address() {
        let mut settings = create_valid_settings();
        settings.chains[0].contract_address = "not-an-address".into();
        let errors = settings.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("contract_address")));
    }

    #[test]
    fn streaming_capability_follows_ws_url() {
        let settings = create_valid_settings();
        assert!(settings.chains[0].supports_streaming());
        assert!(!settings.chains[1].supports_streaming());
    }

    #[test]
    fn catchup_durations() {
        let catchup = CatchupSettings {
            interval_mins: 5,
            timeout_mins: 2,
            lookback_blocks: 100,
        };
        assert_eq!(catchup.interval(), Duration::from_secs(300));
        assert_eq!(catchup.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn chain_lookup() {
        let settings = create_valid_settings();
        assert!(settings.chain(ChainId::new(7001)).is_some());
        assert!(settings.chain(ChainId::new(1)).is_none());
    }
}
