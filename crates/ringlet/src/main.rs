//! `ringlet`: inspect and probe a sharded server list.
//!
//! # Usage
//!
//! ```text
//! ringlet route user:42 feed:1001            # which server owns each key
//! ringlet -c ringlet.toml ring                # ring point distribution
//! ringlet --servers 10.0.0.1:11211,10.0.0.2:11211 probe --wait-ms 500
//! ringlet probe --routing round-robin         # probe through the connection actor
//! ```

mod config;
mod connector;
mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use ringlet_cluster::{Cluster, ModuloCluster, RingCluster, RoundRobinCluster, StickyCluster};
use ringlet_sharding::{KetamaSharding, ModuloSharding, Sharding};
use tracing::{info, warn};

use config::{CliConfig, Routing};
use connector::TcpDialer;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "ringlet", version, about = "Cluster connection routing toolkit")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured server list (`host:port[/weight],...`).
    #[arg(short, long, global = true, env = "RINGLET_SERVERS")]
    servers: Option<String>,

    /// Override the configured routing flavor.
    #[arg(short, long, global = true, value_enum)]
    routing: Option<Routing>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the server each key routes to.
    Route {
        /// Keys to look up.
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Print how the ketama ring is divided between servers.
    Ring,

    /// Connect to every server and report which links come up.
    Probe {
        /// How long to wait for connections before reporting.
        #[arg(short, long, default_value = "1000")]
        wait_ms: u64,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(servers) = cli.servers {
        config.cluster.servers = servers;
    }
    if let Some(routing) = cli.routing {
        config.cluster.routing = routing;
    }

    telemetry::init(&config.log.level);

    let lines = match cli.command {
        Commands::Route { keys } => route(&config, &keys)?,
        Commands::Ring => ring(&config)?,
        Commands::Probe { wait_ms } => probe(&config, Duration::from_millis(wait_ms)).await?,
    };
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

// -----------------------------------------------------------------------
// ringlet route
// -----------------------------------------------------------------------

fn route(config: &CliConfig, keys: &[String]) -> Result<Vec<String>> {
    let servers = config.servers()?;
    let sharding: Box<dyn Sharding> = match config.cluster.routing {
        Routing::Ketama => Box::new(KetamaSharding::with_options(
            servers,
            config.ketama_options(),
        )),
        Routing::Modulo => Box::new(ModuloSharding::new(servers)),
        other => bail!("{other} routing does not map keys to fixed servers"),
    };

    keys.iter()
        .map(|key| {
            let (index, server) = sharding
                .shard_server(key)
                .with_context(|| format!("no server for key {key}"))?;
            Ok(format!("{key} -> {index} {}", server.address))
        })
        .collect()
}

// -----------------------------------------------------------------------
// ringlet ring
// -----------------------------------------------------------------------

fn ring(config: &CliConfig) -> Result<Vec<String>> {
    let servers = config.servers()?;
    let ring = KetamaSharding::with_options(servers, config.ketama_options());

    let mut counts = vec![0usize; ring.servers().len()];
    for point in ring.points() {
        counts[point.shard] += 1;
    }
    let total = ring.point_count().max(1);

    let mut lines = vec![format!(
        "{} servers, {} points, {}",
        ring.servers().len(),
        ring.point_count(),
        if ring.is_weighted() { "weighted" } else { "unweighted" }
    )];
    for (server, count) in ring.servers().iter().zip(&counts) {
        let share = *count as f64 * 100.0 / total as f64;
        lines.push(format!("{server}: {count} points ({share:.1}%)"));
    }
    Ok(lines)
}

// -----------------------------------------------------------------------
// ringlet probe
// -----------------------------------------------------------------------

async fn probe(config: &CliConfig, wait: Duration) -> Result<Vec<String>> {
    let servers = config.servers()?;
    let dialer = Arc::new(TcpDialer::new(config.dial_timeout()));
    let routing = config.cluster.routing;

    let cluster: Arc<dyn Cluster> = match routing {
        Routing::Ketama => Arc::new(RingCluster::with_options(dialer, config.ketama_options())),
        Routing::Modulo => Arc::new(ModuloCluster::new(dialer)),
        Routing::RoundRobin => Arc::new(RoundRobinCluster::start(dialer, config.actor_config())),
        Routing::Sticky => Arc::new(StickyCluster::start(dialer, config.actor_config())),
    };

    info!(%routing, servers = servers.len(), "probing servers");
    for server in &servers {
        if let Err(e) = cluster.add(&server.address, "").await {
            warn!(address = %server.address, %e, "failed to add server");
        }
    }
    tokio::time::sleep(wait).await;

    let conns = cluster.all_conns();
    let mut lines = vec![format!(
        "{} of {} servers connected ({routing})",
        conns.iter().filter(|c| c.ready()).count(),
        servers.len()
    )];
    for server in &servers {
        let state = match conns.iter().find(|c| c.address() == server.address) {
            Some(conn) if conn.ready() => "ready",
            Some(_) => "not ready",
            None => "down",
        };
        lines.push(format!("{}: {state}", server.address));
    }

    cluster.stop();
    Ok(lines)
}
