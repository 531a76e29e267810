//! Storage backend contract.
//!
//! A [`CacheAdapter`] is the pluggability boundary of the engine. New backends
//! only need to implement these five operations; everything else (keys,
//! contexts, stampede protection) lives in the engine.
//!
//! Every operation takes an optional cache name. `None` selects the default
//! namespace.

use std::time::Duration;

use async_trait::async_trait;

use crate::value::CachedValue;

/// Trait for cache storage backends.
///
/// Implementations must absorb their own infrastructure failures: `get`
/// degrades to a miss and the mutating operations degrade to no-ops. Only the
/// engine's codec may fail towards the caller.
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    /// Look up a cached value.
    ///
    /// Returns `None` when the key is not cached, `Some(CachedValue::Null)`
    /// for a cached null.
    async fn get(&self, key: &str, cache_name: Option<&str>) -> Option<CachedValue>;

    /// Store a value and register it under its dependency tags.
    ///
    /// A zero `life_span` stores nothing. `Duration::MAX` never expires.
    async fn set(
        &self,
        key: &str,
        value: CachedValue,
        life_span: Duration,
        cache_name: Option<&str>,
        dependency_tags: &[String],
    );

    /// Remove a single key. Returns whether an entry was found.
    async fn remove(&self, key: &str, cache_name: Option<&str>) -> bool;

    /// Remove every entry registered under all of `dependency_tags`.
    async fn evict_all(&self, cache_name: Option<&str>, dependency_tags: &[String]);

    /// Remove every entry registered under any of `dependency_tags`.
    async fn evict_any(&self, cache_name: Option<&str>, dependency_tags: &[String]);
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of entries currently held locally.
    pub size: usize,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries dropped because they expired.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}
