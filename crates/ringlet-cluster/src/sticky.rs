//! Per-key affinity over a round-robin pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::Cluster;
use crate::actor::{ActorConfig, RoundRobinCluster};
use crate::connector::{Connector, Dialer};
use crate::error::ClusterError;

/// Remembers which connector served each key and keeps handing it out
/// while it stays ready.
///
/// This is affinity, not sharding: the first pick comes from round-robin,
/// so two instances may map the same key differently.
pub struct StickyCluster {
    pool: RoundRobinCluster,
    affinity: Mutex<HashMap<String, Arc<dyn Connector>>>,
}

impl StickyCluster {
    /// Start the underlying connection actor. Must run inside a tokio runtime.
    pub fn start(dialer: Arc<dyn Dialer>, config: ActorConfig) -> Self {
        Self {
            pool: RoundRobinCluster::start(dialer, config),
            affinity: Mutex::new(HashMap::new()),
        }
    }

    /// The round-robin pool backing this cluster.
    pub fn pool(&self) -> &RoundRobinCluster {
        &self.pool
    }

    /// Number of keys with a cached connector.
    pub fn affinity_len(&self) -> usize {
        self.affinity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait::async_trait]
impl Cluster for StickyCluster {
    fn get(&self, key: &str) -> Option<Arc<dyn Connector>> {
        let mut affinity = self.affinity.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(connector) = affinity.get(key) {
            if connector.ready() {
                return Some(connector.clone());
            }
            debug!(key, address = connector.address(), "cached connection not ready, evicting");
            affinity.remove(key);
        }

        let connector = self.pool.get(key)?;
        affinity.insert(key.to_string(), connector.clone());
        Some(connector)
    }

    fn all_conns(&self) -> Vec<Arc<dyn Connector>> {
        self.pool.all_conns()
    }

    async fn add(&self, address: &str, opt: &str) -> Result<(), ClusterError> {
        self.pool.add(address, opt).await
    }

    async fn del(&self, address: &str) -> Result<(), ClusterError> {
        self.pool.del(address).await?;
        self.affinity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, connector| connector.address() != address);
        Ok(())
    }

    fn stop(&self) {
        self.pool.stop();
        self.affinity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
