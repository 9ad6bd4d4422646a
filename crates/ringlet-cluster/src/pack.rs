//! Tie a membership source's lifetime to the cluster it feeds.

use std::sync::Arc;

use tracing::debug;

use crate::Cluster;
use crate::connector::Connector;
use crate::error::ClusterError;

/// Something that can be shut down.
pub trait Stop: Send + Sync {
    fn stop(&self);
}

/// A cluster whose `stop` first stops its membership source.
///
/// Everything else is delegated unchanged.
pub struct Packed {
    input: Arc<dyn Stop>,
    cluster: Arc<dyn Cluster>,
}

/// Wrap `cluster` so that stopping it also stops `input`, input first.
pub fn pack(input: Arc<dyn Stop>, cluster: Arc<dyn Cluster>) -> Packed {
    Packed { input, cluster }
}

impl Packed {
    /// The wrapped cluster.
    pub fn inner(&self) -> &Arc<dyn Cluster> {
        &self.cluster
    }
}

#[async_trait::async_trait]
impl Cluster for Packed {
    fn get(&self, key: &str) -> Option<Arc<dyn Connector>> {
        self.cluster.get(key)
    }

    fn all_conns(&self) -> Vec<Arc<dyn Connector>> {
        self.cluster.all_conns()
    }

    async fn add(&self, address: &str, opt: &str) -> Result<(), ClusterError> {
        self.cluster.add(address, opt).await
    }

    async fn del(&self, address: &str) -> Result<(), ClusterError> {
        self.cluster.del(address).await
    }

    fn stop(&self) {
        debug!("stopping membership source");
        self.input.stop();
        self.cluster.stop();
    }
}
