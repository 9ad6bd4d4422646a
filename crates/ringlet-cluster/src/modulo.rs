//! Append-only modulo routing.

use std::sync::{Arc, PoisonError, RwLock};

use ringlet_sharding::{ModuloSharding, ShardServer, Sharding};
use tracing::{debug, info};

use crate::Cluster;
use crate::connector::{Connector, Dialer};
use crate::error::ClusterError;

#[derive(Default)]
struct ModuloState {
    addresses: Vec<String>,
    conns: Vec<Arc<dyn Connector>>,
    servers: Vec<ShardServer>,
    stopped: bool,
}

/// Routes keys by `crc32 mod N` over servers in the order they were added.
///
/// Members can only be appended: removing one would shift every later
/// index, so `del` does nothing.
pub struct ModuloCluster {
    dialer: Arc<dyn Dialer>,
    state: RwLock<ModuloState>,
}

impl ModuloCluster {
    /// Create an empty modulo cluster that dials through `dialer`.
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self {
            dialer,
            state: RwLock::new(ModuloState::default()),
        }
    }

    /// Addresses in routing order.
    pub fn addresses(&self) -> Vec<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .addresses
            .clone()
    }
}

#[async_trait::async_trait]
impl Cluster for ModuloCluster {
    fn get(&self, key: &str) -> Option<Arc<dyn Connector>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let sharding = ModuloSharding::new(state.servers.clone());
        let index = sharding.shard_index(key)?;
        state.conns.get(index).cloned()
    }

    fn all_conns(&self) -> Vec<Arc<dyn Connector>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .conns
            .clone()
    }

    async fn add(&self, address: &str, opt: &str) -> Result<(), ClusterError> {
        if address.is_empty() {
            return Err(ClusterError::EmptyAddress);
        }
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.stopped {
                return Err(ClusterError::Stopped);
            }
            if state.addresses.iter().any(|a| a == address) {
                return Err(ClusterError::Duplicate(address.to_string()));
            }
        }

        let connector = self.dialer.dial(address, opt).await?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.stopped || state.addresses.iter().any(|a| a == address) {
            let e = if state.stopped {
                ClusterError::Stopped
            } else {
                ClusterError::Duplicate(address.to_string())
            };
            drop(state);
            connector.close();
            return Err(e);
        }
        state.addresses.push(address.to_string());
        state.conns.push(connector);
        state.servers.push(ShardServer::new(address));
        info!(%address, index = state.addresses.len() - 1, "appended server");
        Ok(())
    }

    async fn del(&self, address: &str) -> Result<(), ClusterError> {
        debug!(%address, "modulo cluster does not support delete, ignoring");
        Ok(())
    }

    fn stop(&self) {
        let conns = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.stopped {
                return;
            }
            state.stopped = true;
            state.addresses.clear();
            state.servers.clear();
            std::mem::take(&mut state.conns)
        };
        debug!(servers = conns.len(), "stopping modulo cluster");
        for connector in conns {
            connector.close();
        }
    }
}
