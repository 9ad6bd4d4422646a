//! Key-to-server sharding for Ringlet.
//!
//! This crate maps a lookup key to one server out of a list:
//!
//! - [`KetamaSharding`]: weighted consistent hashing. Each server owns
//!   virtual points on a `u32` ring derived from MD5 digests of
//!   `"{address}-{replica}"` labels; adding a server only remaps the keys
//!   that fall on its new points.
//! - [`ModuloSharding`]: `crc32(key)` folded to 15 bits, modulo the server
//!   count. Cheap to build, but remaps nearly every key when the list changes.
//!
//! Both implement [`Sharding`]. Server lists come from the
//! `host:port[/weight]` text format via [`parse_server_list`].

mod error;
mod ketama;
mod modulo;
mod server;

pub use error::ShardingError;
pub use ketama::{KetamaOptions, KetamaSharding, VirtualPoint};
pub use modulo::ModuloSharding;
pub use server::{ShardServer, parse_server_list, shard_servers};

/// Maps keys to an index into a fixed server list.
pub trait Sharding: Send + Sync {
    /// Return the index of the server owning `key`.
    ///
    /// Returns `None` when the server list is empty.
    fn shard_index(&self, key: &str) -> Option<usize>;

    /// Return all servers, in the order indices refer to.
    fn servers(&self) -> &[ShardServer];

    /// Return the index and server owning `key`.
    fn shard_server(&self, key: &str) -> Option<(usize, &ShardServer)> {
        let index = self.shard_index(key)?;
        self.servers().get(index).map(|server| (index, server))
    }
}
