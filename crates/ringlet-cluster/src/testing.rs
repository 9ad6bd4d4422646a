//! In-memory connectors and dialers for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::connector::{Connector, Dialer};
use crate::error::DialError;

/// A connector that counts `close` calls and can be marked unhealthy.
pub(crate) struct MockConnector {
    address: String,
    ready: AtomicBool,
    closes: AtomicUsize,
}

impl MockConnector {
    pub(crate) fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ready: AtomicBool::new(true),
            closes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub(crate) fn close_count(&self) -> usize {
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

/// A dialer that records every connector it hands out.
///
/// Addresses in the failing set are refused until removed.
#[derive(Default)]
pub(crate) struct MockDialer {
    dialed: Mutex<Vec<Arc<MockConnector>>>,
    failing: Mutex<HashSet<String>>,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
    opts: Mutex<HashMap<String, String>>,
}

impl MockDialer {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub(crate) fn heal(&self, address: &str) {
        self.failing.lock().unwrap().remove(address);
    }

    /// Dial attempts made for `address`, successful or not.
    pub(crate) fn attempts(&self, address: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(address)
            .map_or(0, Vec::len)
    }

    /// When each dial attempt for `address` started, oldest first.
    pub(crate) fn attempt_times(&self, address: &str) -> Vec<Instant> {
        self.attempts
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// Every connector dialed for `address`, oldest first.
    pub(crate) fn dialed(&self, address: &str) -> Vec<Arc<MockConnector>> {
        self.dialed
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.address == address)
            .cloned()
            .collect()
    }

    /// The most recent connector dialed for `address`.
    pub(crate) fn latest(&self, address: &str) -> Option<Arc<MockConnector>> {
        self.dialed(address).pop()
    }

    /// Option string passed on the last dial of `address`.
    pub(crate) fn last_opt(&self, address: &str) -> Option<String> {
        self.opts.lock().unwrap().get(address).cloned()
    }

    pub(crate) fn total_dialed(&self) -> usize {
        self.dialed.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Dialer for MockDialer {
    async fn dial(&self, address: &str, opt: &str) -> Result<Arc<dyn Connector>, DialError> {
        self.opts
            .lock()
            .unwrap()
            .insert(address.to_string(), opt.to_string());
        self.attempts
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push(Instant::now());

        if self.failing.lock().unwrap().contains(address) {
            return Err(DialError::Connect {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let mut dialed = self.dialed.lock().unwrap();
        let connector = Arc::new(MockConnector::new(address));
        dialed.push(connector.clone());
        Ok(connector)
    }
}

/// Whether two connectors are the same allocation.
pub(crate) fn same<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
