//! Directory-watch forwarding for ringlet clusters.
//!
//! A [`DirectoryWatcher`] streams membership events from some directory
//! service. An [`Observer`] feeds them, in order, into a
//! [`MembershipConsumer`](ringlet_cluster::MembershipConsumer):
//! adds and deletes always, value/status/report updates only when the
//! consumer supports them.

mod error;
mod manual;
mod observer;


use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use error::WatchError;
pub use manual::ManualWatcher;
pub use observer::{EVENT_QUEUE_DEPTH, Observer};

/// Kind of change reported for a directory node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchAction {
    Add,
    Delete,
    SetValue,
    SetStatus,
    SetReport,
}

/// One member as stored in the directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchNode {
    pub addr: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub report: String,
}

impl WatchNode {
    /// Create a node with an address and value; status and report stay empty.
    pub fn new(addr: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

/// A change to one directory node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub action: WatchAction,
    pub node: WatchNode,
}

impl WatchEvent {
    /// Create an event applying `action` to `node`.
    pub fn new(action: WatchAction, node: WatchNode) -> Self {
        Self { action, node }
    }
}

/// Source of membership events.
#[async_trait::async_trait]
pub trait DirectoryWatcher: Send + Sync {
    /// Start watching.
    ///
    /// Returns the members present right now and keeps sending later
    /// changes on `tx` until [`stop_watch`](Self::stop_watch) is called.
    /// Sending awaits when `tx` is full.
    async fn watch(&self, tx: mpsc::Sender<WatchEvent>) -> Result<Vec<WatchNode>, WatchError>;

    /// Stop sending events and release `tx`.
    fn stop_watch(&self);
}
