//! Error types for the watch crate.

/// Errors reported by directory watchers and the observer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WatchError {
    /// A watcher was asked for something it cannot do.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The watch has been stopped.
    #[error("watch is closed")]
    Closed,

    /// The directory service failed.
    #[error("directory backend error: {0}")]
    Backend(String),
}
