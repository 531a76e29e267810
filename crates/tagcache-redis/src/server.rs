//! Redis server addresses and failover order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RedisCacheError;

pub const DEFAULT_PORT: u16 = 6379;

/// One Redis server of the failover list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RedisServer {
    pub host: String,
    pub port: u16,
}

impl RedisServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Connection URL selecting logical database `db`.
    pub fn url(&self, db: u8) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, db)
    }
}

impl fmt::Display for RedisServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for RedisServer {
    type Err = RedisCacheError;

    /// Parse `host`, `host:port` or `redis://host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("redis://").unwrap_or(s).trim_end_matches('/');
        if s.is_empty() {
            return Err(RedisCacheError::Config("empty server address".into()));
        }

        match s.rsplit_once(':') {
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(RedisCacheError::Config(format!(
                        "missing host in server address '{s}'"
                    )));
                }
                let port = port.parse::<u16>().map_err(|e| {
                    RedisCacheError::Config(format!("invalid port in server address '{s}': {e}"))
                })?;
                Ok(RedisServer::new(host, port))
            }
            None => Ok(RedisServer::new(s, DEFAULT_PORT)),
        }
    }
}

impl TryFrom<String> for RedisServer {
    type Error = RedisCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RedisServer> for String {
    fn from(server: RedisServer) -> Self {
        server.to_string()
    }
}

/// Parse a server list.
///
/// Accepts the connection string form `Server=host1:port1,host2:port2`
/// (other `key=value` pairs separated by `;` are ignored) or a bare
/// comma-separated list.
pub fn parse_server_list(s: &str) -> Result<Vec<RedisServer>, RedisCacheError> {
    let list = if s.contains('=') {
        s.split(';')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("server"))
            .map(|(_, value)| value)
            .ok_or_else(|| {
                RedisCacheError::Config(format!("connection string '{s}' has no Server entry"))
            })?
    } else {
        s
    };

    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse)
        .collect()
}

/// Advance the connection attempt cursor.
///
/// Every server gets `retry_attempts` consecutive attempts before the next
/// one is tried; after the last server the cursor wraps to the first. The
/// server to use is `servers[cursor / retry_attempts]`.
pub fn next_attempt(cursor: Option<usize>, retry_attempts: usize, server_count: usize) -> usize {
    let retry_attempts = retry_attempts.max(1);
    let next = cursor.map_or(0, |c| c + 1);
    if next / retry_attempts >= server_count {
        0
    } else {
        next
    }
}
