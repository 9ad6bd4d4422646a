//! Shared test harness for ringlet integration tests.
//!
//! Provides [`MockDialer`] and [`MockConnector`]: in-memory backends with
//! close counters, ready toggles and dial failure injection, so cluster
//! behavior can be checked without a network.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ringlet_cluster::{ActorConfig, Connector, DialError, Dialer, RoundRobinCluster};

// =========================================================================
// Mock backends
// =========================================================================

/// An in-memory link to a fake server.
pub struct MockConnector {
    address: String,
    ready: AtomicBool,
    closes: AtomicUsize,
}

impl MockConnector {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ready: AtomicBool::new(true),
            closes: AtomicUsize::new(0),
        }
    }

    /// Simulate the server going away (or coming back) on this link.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// How many times `close` was called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn address(&self) -> &str {
        &self.address
    }

    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Dialer for fake servers.
///
/// Supports failure injection: addresses in the down set refuse
/// connections until brought back up.
#[derive(Default)]
pub struct MockDialer {
    dialed: Mutex<Vec<Arc<MockConnector>>>,
    down: Mutex<HashSet<String>>,
    latency: Mutex<Option<Duration>>,
}

impl MockDialer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Refuse connections to `address`.
    pub fn kill(&self, address: &str) {
        self.down.lock().unwrap().insert(address.to_string());
    }

    /// Accept connections to `address` again.
    pub fn revive(&self, address: &str) {
        self.down.lock().unwrap().remove(address);
    }

    /// Make every dial take `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Every connector handed out, oldest first.
    pub fn all_dialed(&self) -> Vec<Arc<MockConnector>> {
        self.dialed.lock().unwrap().clone()
    }

    /// Connectors handed out for `address`, oldest first.
    pub fn dialed(&self, address: &str) -> Vec<Arc<MockConnector>> {
        self.all_dialed()
            .into_iter()
            .filter(|c| c.address == address)
            .collect()
    }

    /// The newest connector for `address`.
    pub fn latest(&self, address: &str) -> Option<Arc<MockConnector>> {
        self.dialed(address).pop()
    }
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, address: &str, _opt: &str) -> Result<Arc<dyn Connector>, DialError> {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.down.lock().unwrap().contains(address) {
            return Err(DialError::Connect {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let connector = Arc::new(MockConnector::new(address));
        self.dialed.lock().unwrap().push(connector.clone());
        Ok(connector)
    }
}

// =========================================================================
// Helpers
// =========================================================================

/// `n` distinct fake server addresses.
pub fn addresses(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("10.0.0.{i}:11211")).collect()
}

/// Start a round-robin pool over `dialer` with fast test timings.
pub fn start_pool(dialer: &Arc<MockDialer>) -> RoundRobinCluster {
    RoundRobinCluster::start(dialer.clone(), ActorConfig::test_config())
}

/// Poll `condition` until it returns true, panicking after `timeout`.
pub async fn wait_for<F, Fut>(timeout: Duration, condition: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Sorted addresses of the connectors a cluster currently routes to.
pub fn routed_addresses(conns: &[Arc<dyn Connector>]) -> Vec<String> {
    let mut addrs: Vec<String> = conns.iter().map(|c| c.address().to_string()).collect();
    addrs.sort();
    addrs
}
