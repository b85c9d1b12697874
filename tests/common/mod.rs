//! Shared test infrastructure: a scriptable chain client and log
//! fixtures.
#![allow(dead_code)]

pub mod fixtures;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{Address, B256};
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use intent_indexer::error::{InfraError, Result};
use intent_indexer::ports::{ChainClient, LogSubscription, SubscriptionHandle, TransactionInfo};
use intent_indexer::types::primitives::ChainId;

/// A live scripted subscription's feeding side.
#[derive(Clone)]
pub struct Session {
    pub logs: mpsc::Sender<Log>,
    pub errors: mpsc::Sender<String>,
}

/// Scriptable chain client for integration tests.
///
/// - `filter_logs` serves whatever `push_range_log` queued
/// - `subscribe_logs` hands out channel-backed subscriptions the test
///   feeds through [`ScriptedChain::sessions`]
/// - `transaction_by_hash` recovers senders from a scripted map,
///   falling back to a fixed default signer
pub struct ScriptedChain {
    chain: ChainId,
    streaming: bool,
    head: AtomicU64,
    range_logs: Mutex<Vec<Log>>,
    sessions: Mutex<Vec<Session>>,
    senders: Mutex<HashMap<B256, Address>>,
    default_sender: Address,
    block_time: Option<DateTime<Utc>>,
}

impl ScriptedChain {
    pub fn new(chain: u64, streaming: bool, head: u64) -> Self {
        Self {
            chain: ChainId::new(chain),
            streaming,
            head: AtomicU64::new(head),
            range_logs: Mutex::new(vec![]),
            sessions: Mutex::new(vec![]),
            senders: Mutex::new(HashMap::new()),
            default_sender: Address::repeat_byte(0x77),
            block_time: Some(DateTime::from_timestamp(1_750_000_000, 0).expect("valid ts")),
        }
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push_range_log(&self, log: Log) {
        self.range_logs.lock().push(log);
    }

    pub fn script_sender(&self, tx_hash: B256, sender: Address) {
        self.senders.lock().insert(tx_hash, sender);
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// All live feeding handles (one per subscription installed).
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.lock().clone()
    }

    /// Broadcast a log into every live subscription.
    pub async fn broadcast(&self, log: Log) {
        for session in self.sessions() {
            let _ = session.logs.send(log.clone()).await;
        }
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    fn chain(&self) -> ChainId {
        self.chain
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn filter_logs(&self, _filter: &Filter) -> Result<Vec<Log>> {
        Ok(self.range_logs.lock().clone())
    }

    async fn subscribe_logs(&self, _filter: &Filter) -> Result<LogSubscription> {
        if !self.streaming {
            return Err(InfraError::Subscription("no streaming transport".into()).into());
        }
        let (log_tx, logs) = mpsc::channel(8);
        let (err_tx, errors) = mpsc::channel(8);
        self.sessions.lock().push(Session {
            logs: log_tx,
            errors: err_tx,
        });
        Ok(LogSubscription {
            logs,
            errors,
            handle: SubscriptionHandle::new(),
        })
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<TransactionInfo>> {
        let sender = self
            .senders
            .lock()
            .get(&hash)
            .copied()
            .unwrap_or(self.default_sender);
        Ok(Some(TransactionInfo { hash, sender }))
    }

    async fn block_timestamp(&self, _number: u64) -> Result<Option<DateTime<Utc>>> {
        Ok(self.block_time)
    }
}

/// Poll until `cond` holds or a generous deadline passes.
pub async fn wait_for<F: Fn() -> bool>(cond: F) {
    for _ in 0..300 {
        if cond() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Arc-coerce a scripted chain into the client trait object.
pub fn as_client(chain: &Arc<ScriptedChain>) -> Arc<dyn ChainClient> {
    Arc::clone(chain) as Arc<dyn ChainClient>
}
