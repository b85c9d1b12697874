//! Static chain-client resolver.
//!
//! Maps chain ids to live clients. The set is fixed at startup from
//! configuration; there is no runtime registration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::error::{InfraError, Result};
use crate::ports::{ChainClient, ClientResolver};
use crate::types::primitives::ChainId;

use super::alloy_client::AlloyChainClient;

/// Resolver over a fixed chain → client map.
pub struct StaticResolver {
    clients: HashMap<ChainId, Arc<dyn ChainClient>>,
}

impl std::fmt::Debug for StaticResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticResolver")
            .field("chains", &self.chains())
            .finish()
    }
}

impl StaticResolver {
    /// Build a resolver from pre-constructed clients.
    #[must_use]
    pub fn new(clients: impl IntoIterator<Item = Arc<dyn ChainClient>>) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.chain(), c)).collect(),
        }
    }

    /// Connect a client for every configured chain.
    ///
    /// # Errors
    ///
    /// Returns the first connection failure; a partially-connected
    /// service would silently drop chains.
    pub async fn connect_all(settings: &Settings) -> Result<Self> {
        let mut clients: HashMap<ChainId, Arc<dyn ChainClient>> = HashMap::new();

        for chain in &settings.chains {
            let client = AlloyChainClient::connect(chain).await?;
            info!(
                chain = chain.chain_id,
                streaming = client.supports_streaming(),
                "Connected chain client"
            );
            clients.insert(chain.id(), Arc::new(client));
        }

        Ok(Self { clients })
    }
}

impl ClientResolver for StaticResolver {
    fn get_client(&self, chain: ChainId) -> Result<Arc<dyn ChainClient>> {
        self.clients
            .get(&chain)
            .cloned()
            .ok_or_else(|| InfraError::UnknownChain(chain.value()).into())
    }

    fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self.clients.keys().copied().collect();
        chains.sort_unstable();
        chains
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
