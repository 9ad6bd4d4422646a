//! Reconciles a desired address set against a cluster.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::Cluster;
use crate::error::ClusterError;

/// Tracks which addresses it has added to a cluster and applies diffs.
///
/// One lock serializes `add`, `del` and `update`, so a reconcile never
/// interleaves with a single-address change. The underlying cluster keeps
/// its own ordering on top of this.
pub struct StaticList {
    cluster: Arc<dyn Cluster>,
    tracked: Mutex<BTreeSet<String>>,
}

impl StaticList {
    /// Add every address in `addrs` to `cluster`.
    ///
    /// Fails on an empty list, or on the first address the cluster rejects.
    pub async fn new<S: AsRef<str>>(
        addrs: &[S],
        cluster: Arc<dyn Cluster>,
    ) -> Result<Self, ClusterError> {
        if addrs.is_empty() {
            return Err(ClusterError::EmptyServerList);
        }
        let list = Self {
            cluster,
            tracked: Mutex::new(BTreeSet::new()),
        };
        for addr in addrs {
            list.add(addr.as_ref()).await?;
        }
        Ok(list)
    }

    /// Add `address` to the cluster and start tracking it.
    pub async fn add(&self, address: &str) -> Result<(), ClusterError> {
        let mut tracked = self.tracked.lock().await;
        self.add_locked(&mut tracked, address).await
    }

    /// Stop tracking `address` and remove it from the cluster.
    ///
    /// Untracked addresses are ignored.
    pub async fn del(&self, address: &str) -> Result<(), ClusterError> {
        let mut tracked = self.tracked.lock().await;
        self.del_locked(&mut tracked, address).await
    }

    /// Make the tracked set equal to `desired`.
    ///
    /// Deletes come first, then adds, each in sorted order. Returns a
    /// summary of the diff that was applied. Failed adds are logged and
    /// stay untracked so the next update retries them.
    pub async fn update<S: AsRef<str>>(&self, desired: &[S]) -> String {
        let desired: BTreeSet<String> = desired.iter().map(|s| s.as_ref().to_string()).collect();
        let mut tracked = self.tracked.lock().await;

        let deletes: Vec<String> = tracked.difference(&desired).cloned().collect();
        let adds: Vec<String> = desired.difference(&tracked).cloned().collect();

        for address in &deletes {
            if let Err(e) = self.del_locked(&mut tracked, address).await {
                warn!(%address, %e, "failed to delete address during update");
            }
        }
        for address in &adds {
            if let Err(e) = self.add_locked(&mut tracked, address).await {
                warn!(%address, %e, "failed to add address during update");
            }
        }

        let summary = format!(
            "delete address [{}], add address [{}]",
            deletes.join(" "),
            adds.join(" ")
        );
        info!(%summary, "applied server list update");
        summary
    }

    /// Sorted snapshot of the tracked addresses.
    pub async fn tracked(&self) -> Vec<String> {
        self.tracked.lock().await.iter().cloned().collect()
    }

    /// The reconciler does not own the cluster, so stopping it does nothing.
    pub fn stop(&self) {}

    async fn add_locked(
        &self,
        tracked: &mut BTreeSet<String>,
        address: &str,
    ) -> Result<(), ClusterError> {
        if tracked.contains(address) {
            return Err(ClusterError::Duplicate(address.to_string()));
        }
        self.cluster.add(address, "").await?;
        tracked.insert(address.to_string());
        Ok(())
    }

    async fn del_locked(
        &self,
        tracked: &mut BTreeSet<String>,
        address: &str,
    ) -> Result<(), ClusterError> {
        if !tracked.remove(address) {
            return Ok(());
        }
        self.cluster.del(address).await
    }
}
