//! Consistent-hash routing.

use std::sync::{Arc, PoisonError, RwLock};

use ringlet_sharding::{KetamaOptions, KetamaSharding, ShardServer, Sharding};
use tracing::{debug, info};

use crate::Cluster;
use crate::connector::{Connector, Dialer};
use crate::error::ClusterError;

struct RingState {
    /// Members in insertion order; ring shard indices point into this.
    servers: Vec<(String, Arc<dyn Connector>)>,
    sharding: KetamaSharding,
    stopped: bool,
}

impl RingState {
    fn rebuild(&mut self, options: KetamaOptions) {
        let shards = self
            .servers
            .iter()
            .map(|(address, _)| ShardServer::new(address.as_str()))
            .collect();
        self.sharding = KetamaSharding::with_options(shards, options);
    }
}

/// Routes each key to a server on an unweighted ketama ring.
///
/// `add` dials synchronously and rebuilds the ring; lookups hold the read
/// lock only for the ring search.
pub struct RingCluster {
    dialer: Arc<dyn Dialer>,
    options: KetamaOptions,
    state: RwLock<RingState>,
}

impl RingCluster {
    /// Create an empty ring cluster with default ketama options.
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self::with_options(dialer, KetamaOptions::default())
    }

    /// Create a ring cluster whose ring is built with `options`.
    pub fn with_options(dialer: Arc<dyn Dialer>, options: KetamaOptions) -> Self {
        Self {
            dialer,
            options,
            state: RwLock::new(RingState {
                servers: Vec::new(),
                sharding: KetamaSharding::with_options(Vec::new(), options),
                stopped: false,
            }),
        }
    }

    /// Index and address of the server `key` routes to.
    pub fn locate(&self, key: &str) -> Option<(usize, String)> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let index = state.sharding.shard_index(key)?;
        state
            .servers
            .get(index)
            .map(|(address, _)| (index, address.clone()))
    }

    /// Number of points on the current ring.
    pub fn point_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sharding
            .point_count()
    }

    fn check_accepting(&self, address: &str) -> Result<(), ClusterError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.stopped {
            return Err(ClusterError::Stopped);
        }
        if state.servers.iter().any(|(a, _)| a == address) {
            return Err(ClusterError::Duplicate(address.to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Cluster for RingCluster {
    fn get(&self, key: &str) -> Option<Arc<dyn Connector>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let index = state.sharding.shard_index(key)?;
        state.servers.get(index).map(|(_, conn)| conn.clone())
    }

    fn all_conns(&self) -> Vec<Arc<dyn Connector>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.servers.iter().map(|(_, conn)| conn.clone()).collect()
    }

    async fn add(&self, address: &str, opt: &str) -> Result<(), ClusterError> {
        if address.is_empty() {
            return Err(ClusterError::EmptyAddress);
        }
        self.check_accepting(address)?;

        let connector = self.dialer.dial(address, opt).await?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check: another add or a stop may have won while we dialed.
        let rejected = if state.stopped {
            Some(ClusterError::Stopped)
        } else if state.servers.iter().any(|(a, _)| a == address) {
            Some(ClusterError::Duplicate(address.to_string()))
        } else {
            None
        };
        if let Some(e) = rejected {
            drop(state);
            connector.close();
            return Err(e);
        }

        state.servers.push((address.to_string(), connector));
        state.rebuild(self.options);
        info!(%address, servers = state.servers.len(), "added server to ring");
        Ok(())
    }

    async fn del(&self, address: &str) -> Result<(), ClusterError> {
        if address.is_empty() {
            return Err(ClusterError::EmptyAddress);
        }
        let removed = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.stopped {
                return Err(ClusterError::Stopped);
            }
            let pos = state
                .servers
                .iter()
                .position(|(a, _)| a == address)
                .ok_or_else(|| ClusterError::NotFound(address.to_string()))?;
            let (_, connector) = state.servers.remove(pos);
            state.rebuild(self.options);
            connector
        };
        removed.close();
        info!(%address, "removed server from ring");
        Ok(())
    }

    fn stop(&self) {
        let drained = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.stopped {
                return;
            }
            state.stopped = true;
            let drained = std::mem::take(&mut state.servers);
            state.rebuild(self.options);
            drained
        };
        debug!(servers = drained.len(), "stopping ring cluster");
        for (_, connector) in drained {
            connector.close();
        }
    }
}
