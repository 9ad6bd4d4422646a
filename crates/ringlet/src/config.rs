//! TOML configuration for the `ringlet` CLI.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use ringlet_cluster::ActorConfig;
use ringlet_sharding::{KetamaOptions, ShardServer, parse_server_list};
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Backend servers and routing.
    pub cluster: ClusterSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// How keys are mapped to servers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Routing {
    /// Weighted consistent hashing.
    #[default]
    Ketama,
    /// crc32 modulo the server count.
    Modulo,
    /// Rotate over ready connections, ignoring the key.
    RoundRobin,
    /// Round-robin with per-key affinity.
    Sticky,
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Routing::Ketama => "ketama",
            Routing::Modulo => "modulo",
            Routing::RoundRobin => "round-robin",
            Routing::Sticky => "sticky",
        })
    }
}

/// `[cluster]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Server list, `host:port[/weight]` entries separated by commas.
    pub servers: String,
    /// Routing flavor.
    pub routing: Routing,
    /// Per-attempt connect timeout in milliseconds.
    pub dial_timeout_ms: u64,
    /// Reconnect backoff unit in milliseconds.
    pub retry_unit_ms: u64,
    /// Port left out of ketama replica labels, memcached style.
    pub trim_default_port: Option<u16>,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            servers: String::new(),
            routing: Routing::default(),
            dial_timeout_ms: 1000,
            retry_unit_ms: 1000,
            trim_default_port: None,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read {}", p.display()))?;
                let config: CliConfig = toml::from_str(&content)
                    .with_context(|| format!("failed to parse {}", p.display()))?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The configured servers, parsed.
    ///
    /// Fails if the list is malformed or empty.
    pub fn servers(&self) -> anyhow::Result<Vec<ShardServer>> {
        let servers = parse_server_list(&self.cluster.servers)
            .context("invalid [cluster] servers")?;
        anyhow::ensure!(!servers.is_empty(), "no servers configured");
        Ok(servers)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.dial_timeout_ms)
    }

    /// Connection actor settings for the round-robin and sticky flavors.
    pub fn actor_config(&self) -> ActorConfig {
        ActorConfig {
            retry_unit: Duration::from_millis(self.cluster.retry_unit_ms),
            ..ActorConfig::default_config()
        }
    }

    pub fn ketama_options(&self) -> KetamaOptions {
        KetamaOptions {
            trim_default_port: self.cluster.trim_default_port,
        }
    }
}
