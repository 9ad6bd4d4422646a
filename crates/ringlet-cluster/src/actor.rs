//! The connection actor behind [`RoundRobinCluster`].
//!
//! One task owns the membership map and the ready list. Everything that
//! changes them arrives as a message:
//!
//! - **Mutations** (`add` / `del`) from callers, through a bounded queue
//!   that makes bursts of churn wait instead of dropping requests.
//! - **Ready signals** from retry tasks whose dial succeeded.
//! - **Reset requests** from lookups that found a connector not ready.
//! - **Shutdown**, after which every unit is deleted and the task exits.
//!
//! Each pending connection has its own retry task. It dials until success
//! (handing the connector to the actor) or cancellation (delete/shutdown),
//! sleeping `n` retry units after the n-th failure, with `n` wrapping back
//! after `max_backoff_steps`.
//!
//! Lookups never touch the actor: they read the last published ready-list
//! snapshot and advance an atomic cursor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::Cluster;
use crate::connector::{Connector, Dialer};
use crate::error::ClusterError;

/// Depth of the reset queue. A full queue means a reset is already pending.
const RESET_QUEUE_DEPTH: usize = 1;

/// Configuration for a [`RoundRobinCluster`].
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Capacity of the mutation and ready-signal queues.
    pub queue_depth: usize,
    /// Backoff time unit: the n-th consecutive dial failure waits `n` units.
    pub retry_unit: Duration,
    /// Failure count at which the backoff wraps back to one unit.
    pub max_backoff_steps: u32,
}

impl ActorConfig {
    /// Create a config suitable for fast test execution.
    pub fn test_config() -> Self {
        Self {
            queue_depth: 10,
            retry_unit: Duration::from_millis(10),
            max_backoff_steps: 10,
        }
    }

    /// Create a default config for production use.
    pub fn default_config() -> Self {
        Self {
            queue_depth: 10,
            retry_unit: Duration::from_secs(1),
            max_backoff_steps: 10,
        }
    }
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Lifecycle state of a tracked address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// A retry task is dialing.
    Connecting,
    /// A connector is attached and listed for routing.
    Ready,
}

enum Mutation {
    Add { address: String, opt: String },
    Del { address: String },
}

enum Command {
    Mutate(Mutation),
    Units(oneshot::Sender<Vec<(String, UnitState)>>),
}

/// A retry task's successful dial, tagged with the unit generation it
/// was spawned for.
struct ReadySignal {
    address: String,
    generation: u64,
    connector: Arc<dyn Connector>,
}

/// Per-address bookkeeping owned by the actor.
struct ConnUnit {
    connector: Option<Arc<dyn Connector>>,
    cancel: Option<oneshot::Sender<()>>,
    opt: String,
    generation: u64,
}

type ReadyList = Arc<Vec<Arc<dyn Connector>>>;

/// State shared between the handle, the actor and retry tasks.
struct Shared {
    ready: RwLock<ReadyList>,
    cursor: AtomicUsize,
    stopped: AtomicBool,
}

impl Shared {
    fn snapshot(&self) -> ReadyList {
        self.ready
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, list: &[Arc<dyn Connector>]) {
        *self.ready.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(list.to_vec());
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// The single writer of membership state.
struct ConnectionActor {
    dialer: Arc<dyn Dialer>,
    config: ActorConfig,
    shared: Arc<Shared>,
    units: HashMap<String, ConnUnit>,
    list: Vec<Arc<dyn Connector>>,
    next_generation: u64,
    ready_tx: mpsc::Sender<ReadySignal>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConnectionActor {
    /// Process messages until shutdown, then delete every unit.
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut ready_rx: mpsc::Receiver<ReadySignal>,
        mut resets: mpsc::Receiver<String>,
    ) {
        info!("connection actor started");
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                Some(command) = commands.recv() => self.handle_command(command),
                Some(signal) = ready_rx.recv() => self.ready(signal),
                Some(address) = resets.recv() => self.reset(&address),
                _ = shutdown_rx.changed() => {
                    info!("connection actor shutting down");
                    break;
                }
            }
        }

        while let Some(address) = self.units.keys().next().cloned() {
            if let Err(e) = self.del(&address) {
                error!(%address, %e, "failed to delete connection during shutdown");
            }
        }

        // Successes still queued have no unit to attach to.
        ready_rx.close();
        while let Ok(signal) = ready_rx.try_recv() {
            debug!(address = %signal.address, "closing connection that became ready during shutdown");
            signal.connector.close();
        }

        info!("connection actor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Mutate(Mutation::Add { address, opt }) => {
                if let Err(e) = self.add(address, opt) {
                    warn!(%e, "add rejected");
                }
            }
            Command::Mutate(Mutation::Del { address }) => {
                if let Err(e) = self.del(&address) {
                    warn!(%e, "delete rejected");
                }
            }
            Command::Units(reply) => {
                let units = self
                    .units
                    .iter()
                    .map(|(address, unit)| {
                        let state = if unit.connector.is_some() {
                            UnitState::Ready
                        } else {
                            UnitState::Connecting
                        };
                        (address.clone(), state)
                    })
                    .collect();
                let _ = reply.send(units);
            }
        }
    }

    /// Start tracking `address` and spawn its retry task.
    ///
    /// An existing unit whose connector went bad is replaced; any other
    /// existing unit makes this a duplicate.
    fn add(&mut self, address: String, opt: String) -> Result<(), ClusterError> {
        if address.is_empty() {
            return Err(ClusterError::EmptyAddress);
        }

        let stale = match self.units.get(&address) {
            None => false,
            Some(unit) => match &unit.connector {
                Some(connector) if !connector.ready() => true,
                _ => return Err(ClusterError::Duplicate(address)),
            },
        };
        if stale {
            warn!(%address, "connection is bad, resetting");
            self.del(&address)?;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.units.insert(
            address.clone(),
            ConnUnit {
                connector: None,
                cancel: Some(cancel_tx),
                opt: opt.clone(),
                generation,
            },
        );
        debug!(%address, generation, "connecting");

        self.spawn_retry(address, opt, generation, cancel_rx);
        Ok(())
    }

    /// Stop tracking `address`: unlist it, close its connector and cancel
    /// its retry task.
    fn del(&mut self, address: &str) -> Result<(), ClusterError> {
        if address.is_empty() {
            return Err(ClusterError::EmptyAddress);
        }
        let mut unit = self
            .units
            .remove(address)
            .ok_or_else(|| ClusterError::NotFound(address.to_string()))?;

        if let Some(pos) = self.list.iter().position(|c| c.address() == address) {
            self.list.remove(pos);
            self.shared.publish(&self.list);
        }
        if let Some(connector) = unit.connector.take() {
            connector.close();
        }
        if let Some(cancel) = unit.cancel.take() {
            let _ = cancel.send(());
        }

        info!(%address, "deleted connection");
        Ok(())
    }

    /// Attach a freshly dialed connector to its unit and list it.
    fn ready(&mut self, signal: ReadySignal) {
        let ReadySignal {
            address,
            generation,
            connector,
        } = signal;

        let Some(unit) = self.units.get_mut(&address) else {
            error!(%address, "ready connection for unknown address, dropping");
            connector.close();
            return;
        };
        if unit.generation != generation {
            warn!(
                %address,
                generation,
                current = unit.generation,
                "ready connection from a replaced attempt, dropping"
            );
            connector.close();
            return;
        }
        if unit.connector.is_some() {
            error!(%address, "connection already attached, dropping duplicate");
            connector.close();
            return;
        }

        unit.connector = Some(connector.clone());
        self.list.push(connector);
        self.shared.publish(&self.list);
        info!(%address, generation, "connection ready");
    }

    /// Re-dial an address whose connector a lookup found not ready.
    fn reset(&mut self, address: &str) {
        let Some(unit) = self.units.get(address) else {
            info!(%address, "reset for a connection that is already closed");
            return;
        };
        let opt = unit.opt.clone();
        if let Err(e) = self.add(address.to_string(), opt) {
            debug!(%address, %e, "reset skipped");
        }
    }

    fn spawn_retry(
        &self,
        address: String,
        opt: String,
        generation: u64,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let dialer = self.dialer.clone();
        let shared = self.shared.clone();
        let ready_tx = self.ready_tx.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();
        let retry_unit = self.config.retry_unit;
        let max_steps = self.config.max_backoff_steps.max(1);

        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            while !shared.is_stopped() {
                let dialed = tokio::select! {
                    result = dialer.dial(&address, &opt) => result,
                    _ = &mut cancel_rx => {
                        info!(%address, "connect cancelled");
                        return;
                    }
                };

                match dialed {
                    Ok(connector) => {
                        if !matches!(cancel_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
                            info!(%address, "connected after cancellation, closing");
                            connector.close();
                            return;
                        }
                        let signal = ReadySignal {
                            address,
                            generation,
                            connector,
                        };
                        if let Err(mpsc::error::SendError(signal)) = ready_tx.send(signal).await {
                            // The actor is gone; nobody will own this link.
                            signal.connector.close();
                        }
                        return;
                    }
                    Err(e) => {
                        attempt += 1;
                        error!(%address, attempt, %e, "connect failed");

                        tokio::select! {
                            _ = &mut cancel_rx => {
                                info!(%address, "connect cancelled");
                                return;
                            }
                            _ = shutdown_rx.changed() => return,
                            _ = tokio::time::sleep(retry_unit * attempt) => {}
                        }

                        if attempt >= max_steps {
                            attempt = 0;
                        }
                    }
                }
            }
        });
    }
}

/// Round-robin routing over a connection actor.
///
/// `add` and `del` only queue mutations; dialing happens in background
/// retry tasks. `get` ignores the key and rotates over ready connectors.
pub struct RoundRobinCluster {
    shared: Arc<Shared>,
    commands: mpsc::Sender<Command>,
    resets: mpsc::Sender<String>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RoundRobinCluster {
    /// Spawn the connection actor and return its handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(dialer: Arc<dyn Dialer>, config: ActorConfig) -> Self {
        let depth = config.queue_depth.max(1);
        let (commands, commands_rx) = mpsc::channel(depth);
        let (ready_tx, ready_rx) = mpsc::channel(depth);
        let (resets, resets_rx) = mpsc::channel(RESET_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            ready: RwLock::new(Arc::new(Vec::new())),
            cursor: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        });

        let actor = ConnectionActor {
            dialer,
            config,
            shared: shared.clone(),
            units: HashMap::new(),
            list: Vec::new(),
            next_generation: 0,
            ready_tx,
            shutdown_rx,
        };

        let task = tokio::spawn(actor.run(commands_rx, ready_rx, resets_rx));

        Self {
            shared,
            commands,
            resets,
            shutdown_tx,
            task: Mutex::new(Some(task)),
        }
    }

    /// Next ready connector in rotation.
    ///
    /// Connectors found not ready are queued for a reset and skipped; at
    /// most one full pass over the current snapshot is made.
    pub fn next_ready(&self) -> Option<Arc<dyn Connector>> {
        let list = self.shared.snapshot();
        for _ in 0..list.len() {
            if self.shared.is_stopped() {
                return None;
            }
            let index = self.shared.cursor.fetch_add(1, Ordering::Relaxed) % list.len();
            let connector = &list[index];
            if connector.ready() {
                return Some(connector.clone());
            }
            self.request_reset(connector.address());
        }
        None
    }

    /// Snapshot of every tracked address and its state, as seen by the actor.
    pub async fn units(&self) -> Result<Vec<(String, UnitState)>, ClusterError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Units(reply))
            .await
            .map_err(|_| ClusterError::Stopped)?;
        rx.await.map_err(|_| ClusterError::Stopped)
    }

    /// Check whether the actor task is still running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Wait for the actor task to exit (after [`Cluster::stop`]).
    pub async fn join(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(%e, "connection actor panicked");
        }
    }

    fn request_reset(&self, address: &str) {
        if self.shared.is_stopped() {
            return;
        }
        match self.resets.try_send(address.to_string()) {
            Ok(()) => debug!(%address, "queued reset"),
            // Full: a reset is already pending and will cover this one.
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    async fn mutate(&self, mutation: Mutation) -> Result<(), ClusterError> {
        if self.shared.is_stopped() {
            return Err(ClusterError::Stopped);
        }
        self.commands
            .send(Command::Mutate(mutation))
            .await
            .map_err(|_| ClusterError::Stopped)
    }
}

#[async_trait::async_trait]
impl Cluster for RoundRobinCluster {
    fn get(&self, _key: &str) -> Option<Arc<dyn Connector>> {
        self.next_ready()
    }

    fn all_conns(&self) -> Vec<Arc<dyn Connector>> {
        self.shared.snapshot().to_vec()
    }

    async fn add(&self, address: &str, opt: &str) -> Result<(), ClusterError> {
        if address.is_empty() {
            return Err(ClusterError::EmptyAddress);
        }
        self.mutate(Mutation::Add {
            address: address.to_string(),
            opt: opt.to_string(),
        })
        .await?;
        debug!(%address, "queued add");
        Ok(())
    }

    async fn del(&self, address: &str) -> Result<(), ClusterError> {
        if address.is_empty() {
            return Err(ClusterError::EmptyAddress);
        }
        self.mutate(Mutation::Del {
            address: address.to_string(),
        })
        .await?;
        debug!(%address, "queued delete");
        Ok(())
    }

    fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::AcqRel) {
            info!("stopping round-robin cluster");
        }
        self.shutdown_tx.send_replace(true);
    }
}

impl Drop for RoundRobinCluster {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RoundRobinCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundRobinCluster")
            .field("ready", &self.shared.snapshot().len())
            .field("stopped", &self.shared.is_stopped())
            .finish_non_exhaustive()
    }
}
