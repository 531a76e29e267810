//! Two-tier cache adapter: a local L1 map over a shared Redis L2.
//!
//! ## Tiers
//!
//! - **L1**: [`ExpiringMap`] in process memory, consulted first
//! - **L2**: Redis database `cache_db` holding values with their TTL, plus
//!   database `tags_db` holding one set of keys per dependency tag
//!
//! ## Coherence
//!
//! Every instance subscribes to three channels and keeps its L1 in line with
//! writes made by other instances:
//!
//! ```text
//! __keyevent@0__:del     → drop the key from L1
//! __keyevent@0__:expire  → refetch the key into L1, unless this process
//!                          wrote it within the recent-write window
//! __flushed              → drop the whole L1 (FLUSHDB sends no notification,
//!                          so flushing clients publish this themselves)
//! ```
//!
//! ## Failures
//!
//! Connecting walks the configured server list, giving every server
//! `connect_retry_attempts` attempts before moving to the next. Remote errors
//! never reach the caller: they are logged, sent to
//! [`RedisCacheAdapter::subscribe_errors`] receivers and the operation degrades
//! to a miss or no-op. Losing the connection marks the adapter disconnected and
//! the next operation reconnects.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use futures_util::{Stream, StreamExt};
use tagcache_core::{CacheAdapter, CacheStats, CachedEntry, CachedValue, ExpiringMap};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::config::RedisCacheConfig;
use crate::error::{RedisCacheError, Result};
use crate::recent::RecentWrites;
use crate::server::{RedisServer, next_attempt};

/// Longest TTL written to Redis.
///
/// Entries cached "forever" still get a TTL, so every remote write emits the
/// expiration-set notification other instances refresh on.
pub const MAX_REMOTE_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Connection state of a [`RedisCacheAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            2 => ConnectionState::Connected,
            1 => ConnectionState::Connecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Name a key or tag is stored under remotely.
fn remote_name(cache_name: Option<&str>, name: &str) -> String {
    match cache_name {
        Some(cache_name) => format!("{cache_name}\u{0}{name}"),
        None => name.to_owned(),
    }
}

fn remote_ttl_ms(life_span: Duration) -> u64 {
    let ms = life_span.min(MAX_REMOTE_TTL).as_millis().max(1);
    u64::try_from(ms).unwrap_or(u64::MAX)
}

fn build_pool(server: &RedisServer, db: u8, config: &RedisCacheConfig) -> Result<Pool> {
    let timeout = config.timeout();
    let mut pool = PoolConfig::new(config.pool_size);
    pool.timeouts.wait = Some(timeout);
    pool.timeouts.create = Some(timeout);
    pool.timeouts.recycle = Some(timeout);

    let mut redis_config = deadpool_redis::Config::from_url(server.url(db));
    redis_config.pool = Some(pool);
    redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| RedisCacheError::Pool(e.to_string()))
}

#[derive(Debug, Clone, Copy)]
enum Eviction {
    All,
    Any,
}

impl Eviction {
    fn command(self) -> &'static str {
        match self {
            Eviction::All => "SINTER",
            Eviction::Any => "SUNION",
        }
    }
}

/// Pools and listener of one successful connection.
struct RedisLink {
    generation: u64,
    server: RedisServer,
    cache: Pool,
    tags: Pool,
    listener: JoinHandle<()>,
}

impl RedisLink {
    fn close(&self) {
        self.listener.abort();
        self.cache.close();
        self.tags.close();
    }
}

impl Drop for RedisLink {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

struct Channels {
    deleted: String,
    expire_set: String,
    flushed: String,
}

struct Inner {
    config: RedisCacheConfig,
    channels: Channels,
    /// Connection attempt cursor; the lock also serializes reconnects.
    attempts: Mutex<Option<usize>>,
    /// Finished connection attempts, successful or not.
    finished_attempts: AtomicU64,
    state: AtomicU8,
    generation: AtomicU64,
    link: ArcSwapOption<RedisLink>,
    local: ArcSwap<ExpiringMap>,
    recent: ArcSwap<RecentWrites>,
    errors: broadcast::Sender<Arc<RedisCacheError>>,
    disposed: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Inner {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn connected_link(&self) -> Option<Arc<RedisLink>> {
        if self.disposed.load(Ordering::Acquire) || self.state() != ConnectionState::Connected {
            return None;
        }
        self.link.load_full()
    }

    /// Current link, connecting first when needed. `None` when the adapter is
    /// disposed or the connection attempt failed.
    ///
    /// A caller that waited for another caller's attempt takes its outcome
    /// instead of attempting again, so no caller waits longer than one
    /// bounded attempt.
    async fn ensure_connected(self: &Arc<Self>) -> Option<Arc<RedisLink>> {
        if let Some(link) = self.connected_link() {
            return Some(link);
        }

        let observed = self.finished_attempts.load(Ordering::Acquire);
        let mut attempts = self.attempts.lock().await;
        if self.disposed.load(Ordering::Acquire) {
            return None;
        }
        // another caller may have connected while we waited
        if let Some(link) = self.connected_link() {
            return Some(link);
        }
        if self.finished_attempts.load(Ordering::Acquire) != observed {
            return None;
        }

        self.set_state(ConnectionState::Connecting);
        let opened = self.bounded("connect", self.open(&mut attempts)).await;
        self.finished_attempts.fetch_add(1, Ordering::AcqRel);
        match opened {
            Ok(link) => {
                tracing::info!(server = %link.server, "Connected to Redis");
                self.link.store(Some(Arc::clone(&link)));
                self.set_state(ConnectionState::Connected);
                Some(link)
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                self.raise(e);
                None
            }
        }
    }

    async fn open(self: &Arc<Self>, attempts: &mut Option<usize>) -> Result<Arc<RedisLink>> {
        if let Some(previous) = self.link.swap(None) {
            previous.close();
        }
        self.reset_local();

        let servers = &self.config.servers;
        if servers.is_empty() {
            return Err(RedisCacheError::Config("no Redis servers configured".into()));
        }
        let retry_attempts = self.config.connect_retry_attempts.max(1);
        let attempt = next_attempt(*attempts, retry_attempts, servers.len());
        *attempts = Some(attempt);
        let server = servers[attempt / retry_attempts].clone();

        tracing::info!(
            server = %server,
            attempt = attempt % retry_attempts + 1,
            "Connecting to Redis"
        );

        let connection_error = |message: String| RedisCacheError::Connection {
            server: server.to_string(),
            message,
        };

        let cache = build_pool(&server, self.config.cache_db, &self.config)?;
        let tags = build_pool(&server, self.config.tags_db, &self.config)?;

        let mut conn = self
            .bounded("connect", cache.get())
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        if self.config.configure_keyspace_events {
            let configured: Result<()> = self
                .bounded(
                    "CONFIG SET",
                    redis::cmd("CONFIG")
                        .arg("SET")
                        .arg("notify-keyspace-events")
                        .arg("Eg")
                        .query_async(&mut conn),
                )
                .await;
            if let Err(e) = configured {
                tracing::warn!(
                    server = %server,
                    error = %e,
                    "Could not enable keyspace notifications; they must be enabled on the server"
                );
            }
        }
        drop(conn);

        let client = redis::Client::open(server.url(self.config.cache_db))
            .map_err(|e| connection_error(e.to_string()))?;
        let mut pubsub = self
            .bounded("subscribe", client.get_async_pubsub())
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        for channel in [
            &self.channels.deleted,
            &self.channels.expire_set,
            &self.channels.flushed,
        ] {
            self.bounded("SUBSCRIBE", pubsub.subscribe(channel.as_str()))
                .await
                .map_err(|e| match e {
                    RedisCacheError::Command(e) => {
                        RedisCacheError::Subscribe(format!("{channel}: {e}"))
                    }
                    other => other,
                })?;
        }
        tracing::debug!(server = %server, "Subscribed to invalidation channels");

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let listener = tokio::spawn(listen(
            Arc::downgrade(self),
            generation,
            pubsub.into_on_message(),
        ));

        Ok(Arc::new(RedisLink {
            generation,
            server,
            cache,
            tags,
            listener,
        }))
    }

    /// Bound a remote round trip by the configured timeout.
    async fn bounded<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        RedisCacheError: From<E>,
    {
        match tokio::time::timeout(self.config.timeout(), fut).await {
            Ok(result) => result.map_err(RedisCacheError::from),
            Err(_) => Err(RedisCacheError::Timeout {
                operation,
                timeout_ms: self.config.timeout_ms,
            }),
        }
    }

    fn reset_local(&self) {
        self.local.store(Arc::new(ExpiringMap::new()));
        self.recent
            .store(Arc::new(RecentWrites::new(self.config.recent_write_window())));
    }

    fn raise(&self, error: RedisCacheError) {
        tracing::warn!(error = %error, "Redis cache error");
        // no receivers is not an error
        let _ = self.errors.send(Arc::new(error));
    }

    /// Report a failed remote operation on `link`.
    fn fail(&self, link: &RedisLink, error: RedisCacheError) {
        if error.is_connection_loss() {
            self.mark_disconnected(link.generation);
        }
        self.raise(error);
    }

    /// Mark the adapter disconnected if `generation` is still the live link.
    fn mark_disconnected(&self, generation: u64) -> bool {
        let current = self.link.load_full();
        if current.as_ref().is_some_and(|link| link.generation == generation) {
            self.set_state(ConnectionState::Disconnected);
            tracing::warn!(generation, "Redis connection lost, reconnecting on next operation");
            true
        } else {
            false
        }
    }

    /// Fetch a value with its remaining TTL from L2.
    async fn fetch(&self, link: &RedisLink, key: &str) -> Result<Option<CachedEntry>> {
        let mut conn = self.bounded("GET", link.cache.get()).await?;
        let (bytes, ttl_ms): (Option<Vec<u8>>, i64) = self
            .bounded(
                "GET",
                redis::pipe()
                    .cmd("GET")
                    .arg(key)
                    .cmd("PTTL")
                    .arg(key)
                    .query_async(&mut conn),
            )
            .await?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let expires_at = match u64::try_from(ttl_ms) {
            Ok(ms) => Instant::now().checked_add(Duration::from_millis(ms)),
            // -1: stored without a TTL
            Err(_) if ttl_ms == -1 => None,
            // -2: gone between GET and PTTL
            Err(_) => return Ok(None),
        };
        Ok(Some(CachedEntry::with_expiry(
            CachedValue::from_bytes(bytes),
            expires_at,
        )))
    }

    async fn get(self: &Arc<Self>, key: &str) -> Option<CachedValue> {
        let link = self.ensure_connected().await?;
        let local = self.local.load_full();

        if let Some(value) = local.get(key) {
            tracing::debug!(key = %key, "cache hit (L1)");
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        match self.fetch(&link, key).await {
            Ok(Some(entry)) => {
                tracing::debug!(key = %key, "cache hit (L2)");
                self.hits.fetch_add(1, Ordering::Relaxed);
                let value = entry.value.clone();
                local.insert(key, entry);
                Some(value)
            }
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.fail(&link, e);
                None
            }
        }
    }

    /// Populate L1 now and write L2 in the background.
    ///
    /// The returned task resolves to whether the remote write succeeded; on
    /// failure the L1 entry has already been rolled back.
    async fn write(
        self: &Arc<Self>,
        key: String,
        value: CachedValue,
        life_span: Duration,
        tags: Vec<String>,
    ) -> Option<JoinHandle<bool>> {
        if life_span.is_zero() {
            return None;
        }
        let link = self.ensure_connected().await?;
        let local = self.local.load_full();
        local.insert(key.as_str(), CachedEntry::new(value.clone(), life_span));

        let inner = Arc::clone(self);
        Some(tokio::spawn(async move {
            match inner.store(&link, &key, &value, life_span, &tags).await {
                Ok(()) => {
                    tracing::debug!(key = %key, tags = tags.len(), "cache set (L1+L2)");
                    true
                }
                Err(e) => {
                    // not saved remotely, so not kept locally either
                    local.remove(&key);
                    inner.fail(&link, e);
                    false
                }
            }
        }))
    }

    async fn store(
        &self,
        link: &RedisLink,
        key: &str,
        value: &CachedValue,
        life_span: Duration,
        tags: &[String],
    ) -> Result<()> {
        self.recent.load().record(key);

        let mut conn = self.bounded("PSETEX", link.cache.get()).await?;
        let _: () = self
            .bounded(
                "PSETEX",
                redis::cmd("PSETEX")
                    .arg(key)
                    .arg(remote_ttl_ms(life_span))
                    .arg(value.as_bytes())
                    .query_async(&mut conn),
            )
            .await?;

        // tags of an earlier write of `key` are kept; evicting by them still
        // removes the key
        if !tags.is_empty() {
            let mut conn = self.bounded("SADD", link.tags.get()).await?;
            let mut pipe = redis::pipe();
            for tag in tags {
                pipe.cmd("SADD").arg(tag).arg(key).ignore();
            }
            let _: () = self.bounded("SADD", pipe.query_async(&mut conn)).await?;
        }
        Ok(())
    }

    /// Delete `keys` from L2, then from L1 and the recent-write window.
    /// Returns how many keys Redis deleted.
    async fn remove_keys(&self, link: &RedisLink, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let deleted = async {
            let mut conn = self.bounded("DEL", link.cache.get()).await?;
            self.bounded::<usize, _, _>("DEL", redis::cmd("DEL").arg(keys).query_async(&mut conn))
                .await
        }
        .await;

        let local = self.local.load();
        let recent = self.recent.load();
        for key in keys {
            local.remove(key);
            recent.forget(key);
        }
        deleted
    }

    async fn evict(&self, link: &RedisLink, eviction: Eviction, tags: &[String]) -> Result<usize> {
        let command = eviction.command();
        let mut conn = self.bounded(command, link.tags.get()).await?;
        let keys: Vec<String> = self
            .bounded(command, redis::cmd(command).arg(tags).query_async(&mut conn))
            .await?;

        let removed = self.remove_keys(link, &keys).await?;

        // evicted keys no longer need their tag memberships
        match eviction {
            Eviction::Any => {
                let _: () = self
                    .bounded("DEL", redis::cmd("DEL").arg(tags).query_async(&mut conn))
                    .await?;
            }
            Eviction::All if !keys.is_empty() => {
                let mut pipe = redis::pipe();
                for tag in tags {
                    pipe.cmd("SREM").arg(tag).arg(&keys).ignore();
                }
                let _: () = self.bounded("SREM", pipe.query_async(&mut conn)).await?;
            }
            Eviction::All => {}
        }

        tracing::debug!(?eviction, tags = ?tags, keys = keys.len(), "evicted by tags");
        Ok(removed)
    }

    async fn on_notification(&self, msg: &redis::Msg) {
        let channel = msg.get_channel_name();

        if channel == self.channels.flushed {
            tracing::info!("Remote cache flushed, dropping local cache");
            self.reset_local();
            return;
        }

        let key: String = match msg.get_payload() {
            Ok(key) => key,
            Err(e) => {
                self.raise(RedisCacheError::Command(e));
                return;
            }
        };

        if channel == self.channels.deleted {
            if self.local.load().remove(&key) {
                tracing::debug!(key = %key, "remote delete, dropped from L1");
            }
        } else if channel == self.channels.expire_set {
            self.on_expiration_set(&key).await;
        }
    }

    async fn on_expiration_set(&self, key: &str) {
        let local = self.local.load_full();
        if !local.contains(key) {
            return;
        }
        if self.recent.load().consume(key) {
            tracing::debug!(key = %key, "ignoring notification of own write");
            return;
        }
        let Some(link) = self.link.load_full() else {
            return;
        };

        match self.fetch(&link, key).await {
            Ok(Some(entry)) => {
                tracing::debug!(key = %key, "remote write, refreshed L1");
                local.insert(key, entry);
            }
            Ok(None) => {
                local.remove(key);
            }
            Err(e) => self.fail(&link, e),
        }
    }
}

/// Pub/sub delivery loop of one connection.
async fn listen(inner: Weak<Inner>, generation: u64, messages: impl Stream<Item = redis::Msg>) {
    let mut messages = std::pin::pin!(messages);
    while let Some(msg) = messages.next().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.on_notification(&msg).await;
    }

    if let Some(inner) = inner.upgrade() {
        if inner.mark_disconnected(generation) {
            inner.raise(RedisCacheError::ConnectionClosed);
        }
    }
}

/// Distributed cache adapter over Redis.
///
/// Cloning is cheap and clones share the connection and L1.
///
/// ## Example
///
/// ```ignore
/// let config = RedisCacheConfig::from_connection_string("Server=cache1:6379,cache2:6379")?;
/// let adapter = RedisCacheAdapter::connect(config).await?;
/// let engine = CacheEngine::new(Arc::new(adapter));
/// ```
#[derive(Clone)]
pub struct RedisCacheAdapter {
    inner: Arc<Inner>,
}

impl RedisCacheAdapter {
    /// Create a disconnected adapter; the first operation connects.
    pub fn new(config: RedisCacheConfig) -> Result<Self> {
        config.validate().map_err(RedisCacheError::Config)?;

        let (errors, _) = broadcast::channel(config.error_channel_capacity);
        let channels = Channels {
            deleted: config.keyevent_channel("del"),
            expire_set: config.keyevent_channel("expire"),
            flushed: config.flushed_channel.clone(),
        };
        let recent = RecentWrites::new(config.recent_write_window());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                channels,
                attempts: Mutex::new(None),
                finished_attempts: AtomicU64::new(0),
                state: AtomicU8::new(ConnectionState::Disconnected as u8),
                generation: AtomicU64::new(0),
                link: ArcSwapOption::empty(),
                local: ArcSwap::from_pointee(ExpiringMap::new()),
                recent: ArcSwap::from_pointee(recent),
                errors,
                disposed: AtomicBool::new(false),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        })
    }

    /// Create an adapter and attempt the first connection.
    ///
    /// A failed attempt leaves the adapter usable in degraded mode; only an
    /// invalid configuration is an error here.
    pub async fn connect(config: RedisCacheConfig) -> Result<Self> {
        let adapter = Self::new(config)?;
        adapter.ensure_connected().await;
        Ok(adapter)
    }

    pub fn config(&self) -> &RedisCacheConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Server of the live connection.
    pub fn current_server(&self) -> Option<RedisServer> {
        self.inner.connected_link().map(|link| link.server.clone())
    }

    /// Connect if not connected. Returns whether a connection is available.
    pub async fn ensure_connected(&self) -> bool {
        self.inner.ensure_connected().await.is_some()
    }

    /// Receive errors raised by background and foreground operations.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<Arc<RedisCacheError>> {
        self.inner.errors.subscribe()
    }

    /// Like [`CacheAdapter::set`], but waits for the remote write.
    ///
    /// Returns whether the value reached Redis.
    pub async fn set_confirmed(
        &self,
        key: &str,
        value: CachedValue,
        life_span: Duration,
        cache_name: Option<&str>,
        dependency_tags: &[String],
    ) -> bool {
        let Some(task) = self
            .write(key, value, life_span, cache_name, dependency_tags)
            .await
        else {
            return false;
        };
        task.await.unwrap_or(false)
    }

    async fn write(
        &self,
        key: &str,
        value: CachedValue,
        life_span: Duration,
        cache_name: Option<&str>,
        dependency_tags: &[String],
    ) -> Option<JoinHandle<bool>> {
        let tags = dependency_tags
            .iter()
            .map(|tag| remote_name(cache_name, tag))
            .collect();
        self.inner
            .write(remote_name(cache_name, key), value, life_span, tags)
            .await
    }

    async fn require_link(&self) -> Result<Arc<RedisLink>> {
        if self.is_disposed() {
            return Err(RedisCacheError::Disposed);
        }
        self.inner
            .ensure_connected()
            .await
            .ok_or(RedisCacheError::ConnectionClosed)
    }

    /// Tell every instance to drop its L1.
    pub async fn publish_flushed(&self) -> Result<()> {
        let link = self.require_link().await?;
        let inner = &self.inner;
        let mut conn = inner.bounded("PUBLISH", link.cache.get()).await?;
        let receivers: usize = inner
            .bounded(
                "PUBLISH",
                redis::cmd("PUBLISH")
                    .arg(&inner.config.flushed_channel)
                    .arg("1")
                    .query_async(&mut conn),
            )
            .await?;
        tracing::info!(receivers, "Published flushed event");
        Ok(())
    }

    /// Clear both remote databases and notify every instance.
    pub async fn flush(&self) -> Result<()> {
        let link = self.require_link().await?;
        let inner = &self.inner;
        for pool in [&link.cache, &link.tags] {
            let mut conn = inner.bounded("FLUSHDB", pool.get()).await?;
            let _: () = inner
                .bounded("FLUSHDB", redis::cmd("FLUSHDB").query_async(&mut conn))
                .await?;
        }
        self.publish_flushed().await
    }

    /// Number of entries held in L1.
    pub fn local_len(&self) -> usize {
        self.inner.local.load().len()
    }

    /// Whether L1 holds a live entry for `key`.
    pub fn local_contains(&self, key: &str, cache_name: Option<&str>) -> bool {
        self.inner
            .local
            .load()
            .contains(&remote_name(cache_name, key))
    }

    /// Drop `key` from L1 only.
    pub fn evict_local(&self, key: &str, cache_name: Option<&str>) -> bool {
        self.inner
            .local
            .load()
            .remove(&remote_name(cache_name, key))
    }

    pub fn stats(&self) -> CacheStats {
        let local = self.inner.local.load().stats();
        CacheStats {
            size: local.size,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            expirations: local.expirations,
        }
    }

    /// Stop listening, close the pools and refuse to reconnect.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        inner.set_state(ConnectionState::Disconnected);
        if let Some(link) = inner.link.swap(None) {
            link.close();
        }
        inner.local.load().clear();
        tracing::info!("Redis cache adapter disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RedisCacheAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheAdapter")
            .field("servers", &self.inner.config.servers)
            .field("state", &self.state())
            .field("local_len", &self.local_len())
            .finish()
    }
}

#[async_trait]
impl CacheAdapter for RedisCacheAdapter {
    async fn get(&self, key: &str, cache_name: Option<&str>) -> Option<CachedValue> {
        self.inner.get(&remote_name(cache_name, key)).await
    }

    async fn set(
        &self,
        key: &str,
        value: CachedValue,
        life_span: Duration,
        cache_name: Option<&str>,
        dependency_tags: &[String],
    ) {
        // the remote half completes in the background
        let _ = self
            .write(key, value, life_span, cache_name, dependency_tags)
            .await;
    }

    async fn remove(&self, key: &str, cache_name: Option<&str>) -> bool {
        let Some(link) = self.inner.ensure_connected().await else {
            return false;
        };
        let key = remote_name(cache_name, key);
        let was_local = self.inner.local.load().contains(&key);

        match self.inner.remove_keys(&link, std::slice::from_ref(&key)).await {
            Ok(deleted) => deleted > 0 || was_local,
            Err(e) => {
                self.inner.fail(&link, e);
                was_local
            }
        }
    }

    async fn evict_all(&self, cache_name: Option<&str>, dependency_tags: &[String]) {
        self.evict(cache_name, dependency_tags, Eviction::All).await;
    }

    async fn evict_any(&self, cache_name: Option<&str>, dependency_tags: &[String]) {
        self.evict(cache_name, dependency_tags, Eviction::Any).await;
    }
}

impl RedisCacheAdapter {
    async fn evict(&self, cache_name: Option<&str>, dependency_tags: &[String], eviction: Eviction) {
        if dependency_tags.is_empty() {
            return;
        }
        let Some(link) = self.inner.ensure_connected().await else {
            return;
        };
        let tags: Vec<String> = dependency_tags
            .iter()
            .map(|tag| remote_name(cache_name, tag))
            .collect();

        if let Err(e) = self.inner.evict(&link, eviction, &tags).await {
            self.inner.fail(&link, e);
        }
    }
}
