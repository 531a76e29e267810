//! In-process cache adapter.
//!
//! [`ExpiringMap`] is the expiring key/value map used both here and as the L1
//! tier of distributed adapters. [`LocalCacheAdapter`] combines one map and one
//! [`TagIndex`] per cache name and is the fallback when no distributed backend
//! is configured.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::adapter::{CacheAdapter, CacheStats};
use crate::tags::TagIndex;
use crate::value::CachedValue;

/// Name under which the default (unnamed) cache is stored.
const DEFAULT_CACHE_NAME: &str = "\u{1234}";

/// A cached entry with an absolute expiration.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub value: CachedValue,
    /// `None` never expires.
    pub expires_at: Option<Instant>,
}

impl CachedEntry {
    /// Create an entry that expires `life_span` from now.
    ///
    /// Life spans too large to represent as an instant never expire.
    pub fn new(value: CachedValue, life_span: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(life_span),
        }
    }

    pub fn with_expiry(value: CachedValue, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

/// Concurrent map whose entries disappear once expired.
#[derive(Debug, Default)]
pub struct ExpiringMap {
    entries: DashMap<String, CachedEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl ExpiringMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a live value, dropping the entry if it has expired.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            drop(entry);
            if self.entries.remove_if(key, |_, e| e.is_expired()).is_some() {
                self.expirations.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Whether a live entry exists, without touching the hit counters.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    pub fn insert(&self, key: impl Into<String>, entry: CachedEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Remove an entry. Returns whether a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired())
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.expires_at.is_some_and(|at| at <= now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Number of stored entries, expired ones included until cleaned up.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct Namespace {
    entries: ExpiringMap,
    tags: TagIndex,
}

impl Namespace {
    fn remove_keys(&self, keys: &[String]) -> usize {
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key) {
                removed += 1;
            }
            self.tags.forget(key);
        }
        removed
    }
}

/// Local in-memory cache adapter.
///
/// Each cache name gets an independent map and tag index, created on first
/// write and never merged with another.
#[derive(Debug, Default)]
pub struct LocalCacheAdapter {
    namespaces: DashMap<String, Arc<Namespace>>,
}

impl LocalCacheAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace(&self, cache_name: Option<&str>) -> Option<Arc<Namespace>> {
        self.namespaces
            .get(cache_name.unwrap_or(DEFAULT_CACHE_NAME))
            .map(|ns| Arc::clone(&ns))
    }

    fn namespace_or_create(&self, cache_name: Option<&str>) -> Arc<Namespace> {
        let name = cache_name.unwrap_or(DEFAULT_CACHE_NAME);
        if let Some(ns) = self.namespaces.get(name) {
            return Arc::clone(&ns);
        }
        Arc::clone(&self.namespaces.entry(name.to_owned()).or_default())
    }

    /// Remove expired entries from every cache name.
    pub fn cleanup_expired(&self) -> usize {
        self.namespaces
            .iter()
            .map(|ns| ns.entries.cleanup_expired())
            .sum()
    }

    /// Spawn a background task that periodically drops expired entries.
    ///
    /// The task stops once the adapter is dropped.
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let adapter: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(adapter) = adapter.upgrade() else {
                    break;
                };
                let removed = adapter.cleanup_expired();
                if removed > 0 {
                    tracing::debug!(removed, "expired local cache entries cleaned up");
                }
            }
        })
    }

    /// Drop every entry of every cache name.
    pub fn clear(&self) {
        self.namespaces.clear();
    }

    /// Aggregated statistics over all cache names.
    pub fn stats(&self) -> CacheStats {
        self.namespaces
            .iter()
            .map(|ns| ns.entries.stats())
            .fold(CacheStats::default(), |acc, s| CacheStats {
                size: acc.size + s.size,
                hits: acc.hits + s.hits,
                misses: acc.misses + s.misses,
                expirations: acc.expirations + s.expirations,
            })
    }
}

#[async_trait]
impl CacheAdapter for LocalCacheAdapter {
    async fn get(&self, key: &str, cache_name: Option<&str>) -> Option<CachedValue> {
        let result = self.namespace(cache_name).and_then(|ns| ns.entries.get(key));
        if result.is_some() {
            tracing::debug!(key = %key, "cache hit (local)");
        } else {
            tracing::debug!(key = %key, "cache miss (local)");
        }
        result
    }

    async fn set(
        &self,
        key: &str,
        value: CachedValue,
        life_span: Duration,
        cache_name: Option<&str>,
        dependency_tags: &[String],
    ) {
        if life_span.is_zero() {
            return;
        }

        let ns = self.namespace_or_create(cache_name);
        ns.entries.insert(key, CachedEntry::new(value, life_span));
        ns.tags.add(key, dependency_tags);
        tracing::debug!(key = %key, tags = ?dependency_tags, "cache set (local)");
    }

    async fn remove(&self, key: &str, cache_name: Option<&str>) -> bool {
        let Some(ns) = self.namespace(cache_name) else {
            return false;
        };
        let found = ns.entries.remove(key);
        ns.tags.forget(key);
        tracing::debug!(key = %key, found, "cache remove (local)");
        found
    }

    async fn evict_all(&self, cache_name: Option<&str>, dependency_tags: &[String]) {
        let Some(ns) = self.namespace(cache_name) else {
            return;
        };
        let keys = ns.tags.keys_with_all(dependency_tags);
        let removed = ns.remove_keys(&keys);
        tracing::debug!(tags = ?dependency_tags, removed, "evicted entries with all tags (local)");
    }

    async fn evict_any(&self, cache_name: Option<&str>, dependency_tags: &[String]) {
        let Some(ns) = self.namespace(cache_name) else {
            return;
        };
        let keys = ns.tags.keys_with_any(dependency_tags);
        let removed = ns.remove_keys(&keys);
        tracing::debug!(tags = ?dependency_tags, removed, "evicted entries with any tag (local)");
    }
}
