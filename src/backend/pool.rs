//! Client pool management.
//!
//! # Responsibilities
//! - Open one client per distinct backend address, eagerly, at startup
//! - Hand out shared clients by address
//!
//! # Design Decisions
//! - The map is built once and never mutated, so lookups take no lock
//! - A failed call never evicts a client; errors surface to the caller

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::backend::client::{BackendError, GraphClient};
use crate::backend::dgraph::DgraphClient;
use crate::config::BackendConfig;
use crate::load_balancer::endpoint::EndpointInfo;

/// Address → client map.
#[derive(Debug, Default)]
pub struct ClientPool {
    clients: HashMap<String, Arc<dyn GraphClient>>,
}

impl ClientPool {
    /// Connect to every address. The first failure aborts construction.
    pub async fn connect(
        addresses: &BTreeSet<String>,
        config: &BackendConfig,
    ) -> Result<Self, BackendError> {
        let mut clients: HashMap<String, Arc<dyn GraphClient>> = HashMap::new();

        for address in addresses {
            let info = EndpointInfo::parse(address)?;
            let client = DgraphClient::connect(&info, config).await?;
            clients.insert(address.clone(), Arc::new(client));
        }

        tracing::info!(clients = clients.len(), "Client pool built");
        Ok(Self { clients })
    }

    /// Build a pool from ready clients, keyed by their own endpoint.
    pub fn from_clients<I>(clients: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn GraphClient>>,
    {
        let clients = clients
            .into_iter()
            .map(|client| (client.endpoint().to_string(), client))
            .collect();
        Self { clients }
    }

    /// Client for an address previously handed out by the balancer.
    pub fn get(&self, address: &str) -> Option<Arc<dyn GraphClient>> {
        self.clients.get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
