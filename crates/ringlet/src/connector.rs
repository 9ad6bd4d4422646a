//! Plain TCP links, used by `ringlet probe`.

use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use ringlet_cluster::{Connector, DialError, Dialer};
use tokio::io::ReadBuf;
use tokio::net::TcpStream;
use tracing::debug;

/// An open TCP connection to one server.
pub struct TcpConnector {
    address: String,
    stream: Mutex<Option<TcpStream>>,
}

impl TcpConnector {
    fn new(address: &str, stream: TcpStream) -> Self {
        Self {
            address: address.to_string(),
            stream: Mutex::new(Some(stream)),
        }
    }

    fn with_stream<T>(&self, f: impl FnOnce(&TcpStream) -> T) -> Option<T> {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }
}

impl Connector for TcpConnector {
    fn address(&self) -> &str {
        &self.address
    }

    /// Open and not shut down by the peer.
    fn ready(&self) -> bool {
        self.with_stream(|stream| {
            let mut byte = [0u8; 1];
            let mut buf = ReadBuf::new(&mut byte);
            let mut cx = Context::from_waker(Waker::noop());
            // Peek so pending data stays in the socket. Pending means idle.
            match stream.poll_peek(&mut cx, &mut buf) {
                Poll::Pending => true,
                Poll::Ready(Ok(n)) => n > 0,
                Poll::Ready(Err(_)) => false,
            }
        })
        .unwrap_or(false)
    }

    fn close(&self) {
        if self
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            debug!(address = %self.address, "closed tcp connection");
        }
    }
}

/// Dials TCP connections with a per-attempt timeout.
pub struct TcpDialer {
    timeout: Duration,
}

impl TcpDialer {
    /// Create a dialer that gives up on a connect after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait::async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, address: &str, _opt: &str) -> Result<Arc<dyn Connector>, DialError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(address))
            .await
            .map_err(|_| DialError::Timeout {
                address: address.to_string(),
            })?
            .map_err(|e| DialError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        let _ = stream.set_nodelay(true);
        debug!(%address, "tcp connection established");
        Ok(Arc::new(TcpConnector::new(address, stream)))
    }
}
