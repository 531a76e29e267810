//! Distributed Redis adapter for tagcache.
//!
//! [`RedisCacheAdapter`] keeps a local L1 map in front of Redis and stays
//! coherent with other instances through keyspace notifications. Tags are
//! stored as Redis sets, so tag eviction works across every instance sharing
//! the server.
//!
//! Redis must publish generic keyspace events
//! (`CONFIG SET notify-keyspace-events Eg`); the adapter sets this on connect
//! unless `configure_keyspace_events` is off.

pub mod adapter;
pub mod config;
pub mod error;
pub mod recent;
pub mod server;

pub use adapter::{ConnectionState, MAX_REMOTE_TTL, RedisCacheAdapter};
pub use config::RedisCacheConfig;
pub use config::loader::{ConfigError, load_config};
pub use error::RedisCacheError;
pub use server::{RedisServer, parse_server_list};
