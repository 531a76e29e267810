//! Errors raised by the Redis cache adapter.
//!
//! None of these reach the caller of a cached operation: the adapter logs them,
//! sends them through its error channel and degrades to a miss or no-op.

/// Errors that can occur while talking to Redis.
#[derive(Debug, thiserror::Error)]
pub enum RedisCacheError {
    #[error("Invalid Redis cache configuration: {0}")]
    Config(String),

    #[error("Redis connection error ({server}): {message}")]
    Connection { server: String, message: String },

    #[error("Redis pool error: {0}")]
    Pool(String),

    #[error("Redis command error: {0}")]
    Command(#[from] redis::RedisError),

    #[error("Redis {operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Redis subscribe error: {0}")]
    Subscribe(String),

    #[error("Redis pub/sub connection closed")]
    ConnectionClosed,

    #[error("Redis cache adapter disposed")]
    Disposed,
}

impl RedisCacheError {
    /// Whether the error means the current connection can no longer be
    /// trusted and the next operation should reconnect.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            RedisCacheError::Connection { .. }
            | RedisCacheError::Pool(_)
            | RedisCacheError::Timeout { .. }
            | RedisCacheError::ConnectionClosed => true,
            RedisCacheError::Command(e) => {
                e.is_io_error()
                    || e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
            }
            RedisCacheError::Config(_)
            | RedisCacheError::Subscribe(_)
            | RedisCacheError::Disposed => false,
        }
    }
}

impl From<deadpool_redis::PoolError> for RedisCacheError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        RedisCacheError::Pool(e.to_string())
    }
}

pub type Result<T, E = RedisCacheError> = std::result::Result<T, E>;
