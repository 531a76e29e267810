//! Redis cache adapter configuration.
//!
//! ```toml
//! servers = "Server=cache1:6379,cache2:6379"
//! connect_retry_attempts = 3
//! timeout_ms = 5000
//! recent_write_window_ms = 2000
//! ```
//!
//! Every field can be overridden from the environment, e.g.
//! `TAGCACHE__TIMEOUT_MS=1000`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::server::{RedisServer, parse_server_list};

/// Redis cache adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Ordered failover list. Either a list of `host:port` entries or a
    /// connection string such as `Server=host1:port1,host2:port2`.
    #[serde(default = "default_servers", deserialize_with = "deserialize_servers")]
    pub servers: Vec<RedisServer>,

    /// Attempts per server before failing over to the next one
    #[serde(default = "default_connect_retry_attempts")]
    pub connect_retry_attempts: usize,

    /// Bound for connecting and for every remote round trip, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Pooled connections per logical database
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Logical database holding cached values
    #[serde(default = "default_cache_db")]
    pub cache_db: u8,

    /// Logical database holding the tag → keys sets
    #[serde(default = "default_tags_db")]
    pub tags_db: u8,

    /// How long a key written by this process ignores its own
    /// expiration-set notification, in milliseconds
    #[serde(default = "default_recent_write_window_ms")]
    pub recent_write_window_ms: u64,

    /// Channel published to after the remote store is flushed
    #[serde(default = "default_flushed_channel")]
    pub flushed_channel: String,

    /// Enable keyspace notifications (`notify-keyspace-events Eg`) on connect.
    /// Servers refusing `CONFIG SET` must have them enabled already.
    #[serde(default = "default_configure_keyspace_events")]
    pub configure_keyspace_events: bool,

    /// Buffered error notifications per subscriber
    #[serde(default = "default_error_channel_capacity")]
    pub error_channel_capacity: usize,
}

fn default_servers() -> Vec<RedisServer> {
    vec![RedisServer::new("localhost", crate::server::DEFAULT_PORT)]
}

fn default_connect_retry_attempts() -> usize {
    3
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_pool_size() -> usize {
    8
}

fn default_cache_db() -> u8 {
    0
}

fn default_tags_db() -> u8 {
    1
}

fn default_recent_write_window_ms() -> u64 {
    2000
}

fn default_flushed_channel() -> String {
    "__flushed".to_string()
}

fn default_configure_keyspace_events() -> bool {
    true
}

fn default_error_channel_capacity() -> usize {
    256
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            connect_retry_attempts: default_connect_retry_attempts(),
            timeout_ms: default_timeout_ms(),
            pool_size: default_pool_size(),
            cache_db: default_cache_db(),
            tags_db: default_tags_db(),
            recent_write_window_ms: default_recent_write_window_ms(),
            flushed_channel: default_flushed_channel(),
            configure_keyspace_events: default_configure_keyspace_events(),
            error_channel_capacity: default_error_channel_capacity(),
        }
    }
}

impl RedisCacheConfig {
    /// Default configuration over the servers of a connection string.
    pub fn from_connection_string(s: &str) -> Result<Self, String> {
        let servers = parse_server_list(s).map_err(|e| e.to_string())?;
        let config = Self {
            servers,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.servers.is_empty() {
            return Err("servers must list at least one Redis server".into());
        }
        if self.connect_retry_attempts == 0 {
            return Err("connect_retry_attempts must be > 0".into());
        }
        if self.timeout_ms == 0 {
            return Err("timeout_ms must be > 0".into());
        }
        if self.pool_size == 0 {
            return Err("pool_size must be > 0".into());
        }
        if self.cache_db == self.tags_db {
            return Err("cache_db and tags_db must differ".into());
        }
        if self.flushed_channel.is_empty() {
            return Err("flushed_channel must not be empty".into());
        }
        if self.error_channel_capacity == 0 {
            return Err("error_channel_capacity must be > 0".into());
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn recent_write_window(&self) -> Duration {
        Duration::from_millis(self.recent_write_window_ms)
    }

    /// Keyspace notification channel for `event` on the cache database.
    pub fn keyevent_channel(&self, event: &str) -> String {
        format!("__keyevent@{}__:{}", self.cache_db, event)
    }
}

fn deserialize_servers<'de, D>(deserializer: D) -> Result<Vec<RedisServer>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Servers {
        List(Vec<RedisServer>),
        ConnectionString(String),
    }

    match Servers::deserialize(deserializer)? {
        Servers::List(servers) => Ok(servers),
        Servers::ConnectionString(s) => parse_server_list(&s).map_err(serde::de::Error::custom),
    }
}

pub mod loader {
    use super::RedisCacheConfig;
    use config::{Config, Environment, File};
    use std::path::Path;

    #[derive(Debug, thiserror::Error)]
    pub enum ConfigError {
        #[error("config build error: {0}")]
        Build(#[from] config::ConfigError),

        #[error("invalid configuration: {0}")]
        Invalid(String),
    }

    /// Load configuration from an optional TOML file (default
    /// `tagcache.toml` when present) and `TAGCACHE__*` environment variables.
    pub fn load_config(path: Option<&Path>) -> Result<RedisCacheConfig, ConfigError> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                builder = builder.add_source(File::from(p));
            }
            None => {
                let default_path = Path::new("tagcache.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // e.g. TAGCACHE__SERVERS="Server=cache1:6379,cache2:6379"
        builder = builder.add_source(
            Environment::with_prefix("TAGCACHE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let merged: RedisCacheConfig = builder.build()?.try_deserialize()?;
        merged.validate().map_err(ConfigError::Invalid)?;
        Ok(merged)
    }
}
