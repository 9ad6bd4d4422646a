//! Ketama weighted consistent hashing.
//!
//! The ring layout is a compatibility contract: any client following the
//! same digest slicing places keys on the same servers.

use md5::{Digest, Md5};
use tracing::debug;

use crate::Sharding;
use crate::server::ShardServer;

/// Ring points per server when no server is weighted.
const POINTS_PER_SERVER: usize = 160;

/// Ring points derived from a single MD5 digest.
const POINTS_PER_HASH: usize = 4;

/// A position on the ring owned by one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualPoint {
    /// Position on the `u32` ring.
    pub hash: u32,
    /// Index of the owning server.
    pub shard: usize,
}

/// Options for building a [`KetamaSharding`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KetamaOptions {
    /// Strip a `:{port}` suffix equal to this port before hashing addresses.
    ///
    /// memcached clients leave the default port out of replica labels, so
    /// `10.0.0.1:11211` hashes as `10.0.0.1` when this is `Some(11211)`.
    pub trim_default_port: Option<u16>,
}

/// Weighted consistent-hash ring over a fixed server list.
///
/// Each server gets `points / 4` replica labels `"{address}-{replica}"`;
/// every label's MD5 digest is cut into four little-endian `u32` points.
/// A key is owned by the first point at or after its own hash, wrapping
/// to the start of the ring.
#[derive(Debug, Clone)]
pub struct KetamaSharding {
    servers: Vec<ShardServer>,
    points: Vec<VirtualPoint>,
    weighted: bool,
}

impl KetamaSharding {
    /// Build a ring with default options.
    pub fn new(servers: Vec<ShardServer>) -> Self {
        Self::with_options(servers, KetamaOptions::default())
    }

    /// Build a ring for `servers`.
    ///
    /// If any server has a positive weight every server is weighted by its
    /// share of the total; otherwise each server gets 160 points.
    pub fn with_options(servers: Vec<ShardServer>, options: KetamaOptions) -> Self {
        let server_count = servers.len();
        // Summed wide so extreme weights from a server list cannot overflow.
        let total_weight: i128 = servers.iter().map(|s| i128::from(s.weight)).sum();
        let weighted = total_weight > 0;

        let mut points = Vec::with_capacity(server_count * POINTS_PER_SERVER);
        for (index, server) in servers.iter().enumerate() {
            let per_server = if weighted {
                // Negative weights can push a share outside [0, 1].
                let share = (server.weight as f64 / total_weight as f64).clamp(0.0, 1.0);
                let replicas = share * POINTS_PER_SERVER as f64 / POINTS_PER_HASH as f64
                    * server_count as f64;
                (replicas + 0.000_000_000_1).floor() as usize * POINTS_PER_HASH
            } else {
                POINTS_PER_SERVER
            };

            let address = label_address(&server.address, options.trim_default_port);
            for replica in 0..per_server / POINTS_PER_HASH {
                let digest = Md5::digest(format!("{address}-{replica}").as_bytes());
                for alignment in 0..POINTS_PER_HASH {
                    points.push(VirtualPoint {
                        hash: digest_point(&digest, alignment),
                        shard: index,
                    });
                }
            }
        }

        points.sort_by_key(|p| p.hash);
        debug!(
            servers = server_count,
            points = points.len(),
            weighted,
            "built ketama ring"
        );

        Self {
            servers,
            points,
            weighted,
        }
    }

    /// Return the sorted ring points.
    pub fn points(&self) -> &[VirtualPoint] {
        &self.points
    }

    /// Return the total number of points on the ring.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Whether servers were weighted when the ring was built.
    pub fn is_weighted(&self) -> bool {
        self.weighted
    }
}

impl Sharding for KetamaSharding {
    fn shard_index(&self, key: &str) -> Option<usize> {
        match self.servers.len() {
            0 => return None,
            1 => return Some(0),
            _ => {}
        }

        let hash = key_hash(key);
        let pos = self.points.partition_point(|p| p.hash < hash);
        // Past the last point: the ring closes on its first point.
        let point = self.points.get(pos).or_else(|| self.points.first())?;
        Some(point.shard)
    }

    fn servers(&self) -> &[ShardServer] {
        &self.servers
    }
}

/// Hash a key onto the ring: the first point of its MD5 digest.
pub(crate) fn key_hash(key: &str) -> u32 {
    digest_point(&Md5::digest(key.as_bytes()), 0)
}

/// Read point `alignment` (0..4) of a digest as a little-endian `u32`.
fn digest_point(digest: &[u8], alignment: usize) -> u32 {
    let offset = alignment * POINTS_PER_HASH;
    u32::from_le_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ])
}

fn label_address(address: &str, trim_default_port: Option<u16>) -> &str {
    match trim_default_port {
        Some(port) => address
            .strip_suffix(&format!(":{port}"))
            .unwrap_or(address),
        None => address,
    }
}
