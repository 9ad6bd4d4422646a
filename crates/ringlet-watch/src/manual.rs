//! An in-process directory driven by explicit calls.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::WatchError;
use crate::{DirectoryWatcher, WatchEvent, WatchNode};

/// A [`DirectoryWatcher`] whose events are pushed by the caller.
///
/// Useful for static deployments that still want the observer plumbing,
/// and for tests.
pub struct ManualWatcher {
    initial: Vec<WatchNode>,
    tx: Mutex<Option<mpsc::Sender<WatchEvent>>>,
    started: Mutex<bool>,
}

impl ManualWatcher {
    /// Create a watcher that reports `initial` as the starting members.
    pub fn new(initial: Vec<WatchNode>) -> Self {
        Self {
            initial,
            tx: Mutex::new(None),
            started: Mutex::new(false),
        }
    }

    /// Deliver `event` to the observer, waiting while its queue is full.
    pub async fn push(&self, event: WatchEvent) -> Result<(), WatchError> {
        if event.node.addr.is_empty() {
            return Err(WatchError::InvalidArgument("event has an empty address".into()));
        }
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(WatchError::Closed)?;
        tx.send(event).await.map_err(|_| WatchError::Closed)
    }
}

#[async_trait::async_trait]
impl DirectoryWatcher for ManualWatcher {
    async fn watch(&self, tx: mpsc::Sender<WatchEvent>) -> Result<Vec<WatchNode>, WatchError> {
        {
            let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
            if *started {
                return Err(WatchError::InvalidArgument("watch already started".into()));
            }
            *started = true;
        }
        *self.tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        Ok(self.initial.clone())
    }

    fn stop_watch(&self) {
        if self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!("manual watch stopped");
        }
    }
}
