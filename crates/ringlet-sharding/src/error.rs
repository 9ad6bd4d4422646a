//! Error types for server-list parsing.

/// Errors produced while parsing a server list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardingError {
    /// The `/weight` suffix of an entry is not an integer.
    #[error("invalid weight in server entry {entry:?}")]
    InvalidWeight {
        /// The offending `host:port/weight` entry.
        entry: String,
    },

    /// An entry has a weight but no address (e.g. `"/3"`).
    #[error("server entry {entry:?} has no address")]
    EmptyAddress {
        /// The offending entry.
        entry: String,
    },
}
