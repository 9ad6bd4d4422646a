//! Shard server entries and the `host:port[/weight]` list format.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ShardingError;

/// A backend server taking part in sharding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardServer {
    /// Server address, usually `host:port`.
    pub address: String,
    /// Relative weight. `0` means unweighted (equal share).
    #[serde(default)]
    pub weight: i64,
}

impl ShardServer {
    /// Create an unweighted server entry.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            weight: 0,
        }
    }

    /// Create a server entry with an explicit weight.
    pub fn weighted(address: impl Into<String>, weight: i64) -> Self {
        Self {
            address: address.into(),
            weight,
        }
    }

    /// Parse a single `host:port[/weight]` entry.
    pub fn parse(entry: &str) -> Result<Self, ShardingError> {
        let entry = entry.trim();
        let (address, weight) = match entry.split_once('/') {
            Some((address, weight)) => {
                let weight = weight
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ShardingError::InvalidWeight {
                        entry: entry.to_string(),
                    })?;
                (address.trim(), weight)
            }
            None => (entry, 0),
        };

        if address.is_empty() {
            return Err(ShardingError::EmptyAddress {
                entry: entry.to_string(),
            });
        }

        Ok(Self::weighted(address, weight))
    }
}

impl fmt::Display for ShardServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weight == 0 {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{}/{}", self.address, self.weight)
        }
    }
}

/// Parse a comma-separated server list: `host:port[/weight][,host:port[/weight]]...`.
///
/// Whitespace around entries is ignored and empty entries are skipped, so
/// `"a:1, b:2/3,"` yields two servers.
pub fn parse_server_list(hosts: &str) -> Result<Vec<ShardServer>, ShardingError> {
    hosts
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(ShardServer::parse)
        .collect()
}

/// Parse one `host:port[/weight]` entry per element.
pub fn shard_servers<S: AsRef<str>>(hosts: &[S]) -> Result<Vec<ShardServer>, ShardingError> {
    hosts
        .iter()
        .map(|entry| ShardServer::parse(entry.as_ref()))
        .collect()
}
