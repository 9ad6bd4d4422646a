//! Modulo hashing compatible with legacy memcached clients.

use crate::Sharding;
use crate::server::ShardServer;

/// `crc32(key)` folded to 15 bits, modulo the server count.
///
/// Building is O(1) beyond owning the list, so callers may rebuild it per
/// lookup. Resizing the list remaps nearly every key.
#[derive(Debug, Clone)]
pub struct ModuloSharding {
    servers: Vec<ShardServer>,
}

impl ModuloSharding {
    /// Wrap a server list.
    pub fn new(servers: Vec<ShardServer>) -> Self {
        Self { servers }
    }
}

impl Sharding for ModuloSharding {
    fn shard_index(&self, key: &str) -> Option<usize> {
        if self.servers.is_empty() {
            return None;
        }
        Some(modulo_hash(key) as usize % self.servers.len())
    }

    fn servers(&self) -> &[ShardServer] {
        &self.servers
    }
}

/// Bits 16..31 of the IEEE CRC-32, masked to 15 bits.
pub(crate) fn modulo_hash(key: &str) -> u32 {
    (crc32fast::hash(key.as_bytes()) >> 16) & 0x7fff
}
