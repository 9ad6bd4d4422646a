//! Error types for the cluster crate.

/// Errors reported by cluster membership operations.
///
/// None of these are fatal: the cluster keeps serving lookups after
/// returning any of them.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// An add or delete was given an empty address.
    #[error("address is empty")]
    EmptyAddress,

    /// The address is already tracked with a live connection.
    #[error("duplicate server {0}")]
    Duplicate(String),

    /// The address is not tracked.
    #[error("server {0} not found")]
    NotFound(String),

    /// The cluster has been stopped.
    #[error("cluster is stopped")]
    Stopped,

    /// A reconciler was created without any address.
    #[error("server list is empty")]
    EmptyServerList,

    /// A synchronous dial failed.
    #[error("dial error: {0}")]
    Dial(#[from] DialError),
}

/// Errors returned by a [`Dialer`](crate::Dialer).
#[derive(Debug, Clone, thiserror::Error)]
pub enum DialError {
    /// The connection attempt failed.
    #[error("failed to connect to {address}: {reason}")]
    Connect {
        /// Address being dialed.
        address: String,
        /// Underlying failure.
        reason: String,
    },

    /// The connection attempt did not finish in time.
    #[error("timed out connecting to {address}")]
    Timeout {
        /// Address being dialed.
        address: String,
    },

    /// The dialer refused the address or option.
    #[error("dial rejected: {0}")]
    Rejected(String),
}
