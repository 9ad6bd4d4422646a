//! The event forwarder.

use std::sync::{Arc, Mutex, PoisonError};

use ringlet_cluster::{MembershipConsumer, ReportConsumer, StatusConsumer, Stop, ValueConsumer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::WatchError;
use crate::{DirectoryWatcher, WatchAction, WatchEvent};

/// Capacity of the queue between the watcher and the dispatcher.
pub const EVENT_QUEUE_DEPTH: usize = 100;

/// The consumer plus whichever optional capabilities it advertised.
struct Targets {
    membership: Arc<dyn MembershipConsumer>,
    values: Option<Arc<dyn ValueConsumer>>,
    statuses: Option<Arc<dyn StatusConsumer>>,
    reports: Option<Arc<dyn ReportConsumer>>,
}

impl Targets {
    fn probe(consumer: Arc<dyn MembershipConsumer>) -> Self {
        Self {
            values: consumer.clone().value_updates(),
            statuses: consumer.clone().status_updates(),
            reports: consumer.clone().report_updates(),
            membership: consumer,
        }
    }

    async fn dispatch(&self, event: WatchEvent) {
        let WatchEvent { action, node } = event;
        let address = node.addr.as_str();
        match action {
            WatchAction::Add => {
                if let Err(e) = self.membership.add_member(address, &node.value).await {
                    warn!(%address, %e, "consumer rejected member");
                }
            }
            WatchAction::Delete => {
                if let Err(e) = self.membership.remove_member(address).await {
                    warn!(%address, %e, "consumer failed to remove member");
                }
            }
            WatchAction::SetValue => match &self.values {
                Some(values) => values.set_value(address, &node.value).await,
                None => debug!(%address, "consumer ignores value updates"),
            },
            WatchAction::SetStatus => match &self.statuses {
                Some(statuses) => statuses.set_status(address, &node.status).await,
                None => debug!(%address, "consumer ignores status updates"),
            },
            WatchAction::SetReport => match &self.reports {
                Some(reports) => reports.set_report(address, &node.report).await,
                None => debug!(%address, "consumer ignores report updates"),
            },
        }
    }
}

/// Forwards a watcher's events to a membership consumer.
///
/// One dispatcher task drains a bounded queue, so events reach the
/// consumer in the order the watcher produced them and a slow consumer
/// pushes back on the watcher.
pub struct Observer {
    watcher: Arc<dyn DirectoryWatcher>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Observer {
    /// Probe `consumer`, start the watch, add the initial members and spawn
    /// the dispatcher.
    pub async fn start(
        watcher: Arc<dyn DirectoryWatcher>,
        consumer: Arc<dyn MembershipConsumer>,
    ) -> Result<Self, WatchError> {
        let targets = Targets::probe(consumer);
        let (tx, mut rx) = mpsc::channel::<WatchEvent>(EVENT_QUEUE_DEPTH);

        let initial = watcher.watch(tx).await?;
        info!(members = initial.len(), "directory watch started");
        for node in &initial {
            if let Err(e) = targets.membership.add_member(&node.addr, &node.value).await {
                warn!(address = %node.addr, %e, "consumer rejected initial member");
            }
        }

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                targets.dispatch(event).await;
            }
            debug!("directory watch closed, dispatcher exiting");
        });

        Ok(Self {
            watcher,
            task: Mutex::new(Some(task)),
        })
    }

    /// Stop the watch. Events already queued are still delivered.
    pub fn stop(&self) {
        info!("stopping directory watch");
        self.watcher.stop_watch();
    }

    /// Wait for the dispatcher to deliver every queued event and exit.
    pub async fn join(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(%e, "dispatcher task panicked");
        }
    }
}

impl Stop for Observer {
    fn stop(&self) {
        Observer::stop(self);
    }
}
