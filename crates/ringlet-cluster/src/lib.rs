//! Connection lifecycle and key routing for a set of backend servers.
//!
//! This crate provides:
//!
//! - [`Connector`] / [`Dialer`]: the contract for a backend link.
//! - [`Cluster`]: the routing surface shared by every flavor.
//! - [`RoundRobinCluster`]: the connection actor. A single task owns all
//!   membership state, dials in background retry tasks and publishes a
//!   ready list that lookups read without blocking.
//! - [`RingCluster`]: ketama consistent-hash routing.
//! - [`ModuloCluster`]: append-only modulo routing.
//! - [`StickyCluster`]: per-key affinity on top of the round-robin actor.
//! - [`StaticList`]: reconciles a desired address set against a cluster.
//! - [`MembershipConsumer`]: what directory watchers feed membership into.
//! - [`pack`]: ties a membership source's lifetime to its cluster.

mod actor;
mod connector;
mod consumer;
mod error;
mod modulo;
mod pack;
mod ring;
mod static_list;
mod sticky;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use actor::{ActorConfig, RoundRobinCluster, UnitState};
pub use connector::{Connector, Dialer};
pub use consumer::{MembershipConsumer, ReportConsumer, StatusConsumer, ValueConsumer};
pub use error::{ClusterError, DialError};
pub use modulo::ModuloCluster;
pub use pack::{Packed, Stop, pack};
pub use ring::RingCluster;
pub use static_list::StaticList;
pub use sticky::StickyCluster;

/// Routing surface shared by every cluster flavor.
///
/// Lookups are synchronous and never wait on the network; membership
/// changes are async because they may dial or queue.
#[async_trait::async_trait]
pub trait Cluster: Send + Sync {
    /// Return a connector for `key`, or `None` if no backend is available.
    fn get(&self, key: &str) -> Option<Arc<dyn Connector>>;

    /// Return every connector currently routable (for fan-out).
    fn all_conns(&self) -> Vec<Arc<dyn Connector>>;

    /// Start tracking `address`, dialed with `opt`.
    async fn add(&self, address: &str, opt: &str) -> Result<(), ClusterError>;

    /// Stop tracking `address` and release its connector.
    async fn del(&self, address: &str) -> Result<(), ClusterError>;

    /// Shut the cluster down. Safe to call more than once.
    fn stop(&self);
}
