//! Log and settings fixtures shared by the integration suites.

use alloy::primitives::{Address, B256, Bytes, LogData, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;

use intent_indexer::abi::intent_gateway;
use intent_indexer::config::{
    CatchupSettings, ChainSettings, DatabaseSettings, FetchSettings, LoggingSettings,
    MetricsSettings, Settings,
};

/// Source chain used throughout the suites.
pub const SOURCE_CHAIN: u64 = 7001;
/// Destination chain used throughout the suites.
pub const DEST_CHAIN: u64 = 42161;
/// Gateway address on both chains.
pub const CONTRACT: &str = "0x0000000000000000000000000000000000000001";

/// Wrap encoded event data in an RPC log at the given coordinates.
pub fn wrap_log(data: LogData, block: u64, log_index: u64, tx: B256) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: CONTRACT.parse().expect("valid contract"),
            data,
        },
        block_hash: Some(B256::repeat_byte(0xbb)),
        block_number: Some(block),
        block_timestamp: None,
        transaction_hash: Some(tx),
        transaction_index: Some(0),
        log_index: Some(log_index),
        removed: false,
    }
}

/// `IntentInitiated` log: 1 token with a 0.1 token fee to DEST_CHAIN.
pub fn initiated_log(intent_id: B256, block: u64, tx: B256) -> Log {
    let event = intent_gateway::IntentInitiated {
        intentId: intent_id,
        asset: Address::repeat_byte(0x22),
        amount: U256::from(1_000_000_000_000_000_000u128),
        targetChain: U256::from(DEST_CHAIN),
        receiver: Bytes::from(vec![0x33; 20]),
        tip: U256::from(100_000_000_000_000_000u128),
        salt: U256::from(1u64),
    };
    wrap_log(event.encode_log_data(), block, 0, tx)
}

/// `IntentFulfilled` log for the intent.
pub fn fulfilled_log(intent_id: B256, block: u64, tx: B256) -> Log {
    let event = intent_gateway::IntentFulfilled {
        intentId: intent_id,
        asset: Address::repeat_byte(0x22),
        amount: U256::from(1_000_000_000_000_000_000u128),
        receiver: Address::repeat_byte(0x33),
    };
    wrap_log(event.encode_log_data(), block, 0, tx)
}

/// `IntentSettled` log; `fulfiller` decides the settlement fork.
pub fn settled_log(intent_id: B256, fulfilled: bool, fulfiller: Address, block: u64, tx: B256) -> Log {
    let event = intent_gateway::IntentSettled {
        intentId: intent_id,
        asset: Address::repeat_byte(0x22),
        amount: U256::from(1_000_000_000_000_000_000u128),
        receiver: Address::repeat_byte(0x33),
        fulfilled,
        fulfiller,
        actualAmount: U256::from(1_000_000_000_000_000_000u128),
        paidTip: U256::from(100_000_000_000_000_000u128),
    };
    wrap_log(event.encode_log_data(), block, 1, tx)
}

/// Two-chain settings: streaming source, polling destination.
pub fn two_chain_settings() -> Settings {
    Settings {
        chains: vec![
            ChainSettings {
                chain_id: SOURCE_CHAIN,
                rpc_url: "http://localhost:8545".into(),
                ws_url: Some("ws://localhost:8546".into()),
                contract_address: CONTRACT.into(),
                default_block: 0,
                poll_interval_ms: 25,
            },
            ChainSettings {
                chain_id: DEST_CHAIN,
                rpc_url: "http://localhost:9545".into(),
                ws_url: Some("ws://localhost:9546".into()),
                contract_address: CONTRACT.into(),
                default_block: 0,
                poll_interval_ms: 25,
            },
        ],
        catchup: CatchupSettings {
            interval_mins: 60,
            timeout_mins: 1,
            lookback_blocks: 100,
        },
        fetch: FetchSettings {
            max_retries: 3,
            base_delay_ms: 10,
        },
        database: DatabaseSettings {
            url: "postgres://localhost/test".into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_ms: 1000,
        },
        logging: LoggingSettings {
            level: "info".into(),
            format: "pretty".into(),
        },
        metrics: MetricsSettings {
            enabled: false,
            host: "127.0.0.1".into(),
            port: 9090,
        },
        shutdown_timeout_secs: 5,
    }
}
