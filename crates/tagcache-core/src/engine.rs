//! Interception engine.
//!
//! The engine drives a cache adapter around one operation invocation through
//! three hooks:
//!
//! ```text
//! on_entry ──hit──────────────────────────────▶ cached value
//!    │
//!   miss: push context, take stampede lock
//!    │
//!    ▼
//! run operation ──ok──▶ on_success (commit context key/life span/tags)
//!    │                         │
//!    └──────err────────────────┴──▶ on_exit (release lock)
//! ```
//!
//! [`CacheEngine::cached`] wires the three hooks around an async closure; any
//! other wrapping mechanism can call the hooks directly, running the operation
//! inside [`CacheScope::enter`] with the invocation's context.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::adapter::CacheAdapter;
use crate::context::{CacheContext, CacheScope, SharedContext};
use crate::error::CacheError;
use crate::key::{ArgValue, CacheKey};
use crate::local::LocalCacheAdapter;
use crate::policy::{CacheableOperation, EvictPolicy};
use crate::stampede::{StampedeGuard, StampedeLocks};
use crate::value::CachedValue;

/// Outcome of [`CacheEngine::on_entry`].
#[derive(Debug)]
pub enum Entry {
    /// Serve this value instead of running the operation.
    Hit(CachedValue),
    /// Run the operation under this invocation.
    Miss(Invocation),
}

/// One in-flight cacheable invocation that missed the cache.
///
/// Dropping an invocation without [`CacheEngine::on_exit`] (a cancelled
/// future, for instance) still releases its lock.
#[derive(Debug)]
pub struct Invocation {
    context: SharedContext,
    cache_name: Option<String>,
    _lock: Option<StampedeGuard>,
}

impl Invocation {
    /// Context the running operation may adjust.
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn cache_key(&self) -> CacheKey {
        self.context.lock().cache_key().clone()
    }

    pub fn cache_name(&self) -> Option<&str> {
        self.cache_name.as_deref()
    }
}

/// Caching engine over an injected adapter.
#[derive(Clone)]
pub struct CacheEngine {
    adapter: Arc<dyn CacheAdapter>,
    locks: StampedeLocks,
}

impl CacheEngine {
    pub fn new(adapter: Arc<dyn CacheAdapter>) -> Self {
        Self {
            adapter,
            locks: StampedeLocks::new(),
        }
    }

    /// Engine over a fresh [`LocalCacheAdapter`].
    pub fn local() -> Self {
        Self::new(Arc::new(LocalCacheAdapter::new()))
    }

    pub fn adapter(&self) -> &Arc<dyn CacheAdapter> {
        &self.adapter
    }

    /// Keys with a stampede lock currently held or awaited.
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }

    /// Entry hook: look the key up, or open an invocation on a miss.
    ///
    /// With stampede protection the miss path waits for the key's lock and
    /// looks the key up again, so only the first concurrent caller runs the
    /// operation.
    pub async fn on_entry(&self, op: &CacheableOperation, args: &[ArgValue]) -> Entry {
        let key = op.build_key(args);
        let cache_name = op.cache_name();

        if let Some(value) = self.adapter.get(key.as_str(), cache_name).await {
            return Entry::Hit(value);
        }

        let lock = if op.policy().stampede_protection {
            let guard = self.locks.acquire(&lock_key(cache_name, &key)).await;
            if let Some(value) = self.adapter.get(key.as_str(), cache_name).await {
                tracing::debug!(key = %key, "value committed while waiting for stampede lock");
                return Entry::Hit(value);
            }
            Some(guard)
        } else {
            None
        };

        Entry::Miss(Invocation {
            context: Arc::new(Mutex::new(CacheContext::new(
                key,
                op.policy().life_span,
                op.policy().dependency_tags.clone(),
            ))),
            cache_name: op.policy().cache_name.clone(),
            _lock: lock,
        })
    }

    /// Success hook: commit `value` under the context's current settings.
    pub async fn on_success(&self, invocation: &Invocation, value: CachedValue) {
        let snapshot = invocation.context.lock().clone();
        if snapshot.is_caching_disabled() {
            tracing::debug!(key = %snapshot.cache_key(), "caching disabled for invocation");
            return;
        }

        self.adapter
            .set(
                snapshot.cache_key().as_str(),
                value,
                snapshot.life_span(),
                invocation.cache_name(),
                snapshot.dependency_tags(),
            )
            .await;
    }

    /// Exit hook: release the invocation's stampede lock.
    pub fn on_exit(&self, invocation: Invocation) {
        drop(invocation);
    }

    /// Run `f` through the cache.
    ///
    /// Serves a cached value when there is one; otherwise runs `f`, caches an
    /// `Ok` result and returns it. Errors of `f` are returned untouched and
    /// never cached. Codec failures surface as `E::from(CacheError)`.
    pub async fn cached<T, E, F, Fut>(
        &self,
        op: &CacheableOperation,
        args: &[ArgValue],
        f: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if !op.policy().cacheable {
            return f().await;
        }

        let invocation = match self.on_entry(op, args).await {
            Entry::Hit(value) => return value.decode::<T>().map_err(E::from),
            Entry::Miss(invocation) => invocation,
        };

        let outcome = match CacheScope::enter(Arc::clone(invocation.context()), f()).await {
            Ok(value) => match CachedValue::encode(&value) {
                Ok(encoded) => {
                    self.on_success(&invocation, encoded).await;
                    Ok(value)
                }
                Err(e) => Err(E::from(e)),
            },
            Err(e) => Err(e),
        };

        self.on_exit(invocation);
        outcome
    }

    /// Run `f`, then evict by `policy` whether `f` succeeded or not.
    pub async fn evicting<R, F, Fut>(&self, policy: &EvictPolicy, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let result = f().await;
        self.evict(policy).await;
        result
    }

    /// Evict by `policy`.
    pub async fn evict(&self, policy: &EvictPolicy) {
        let cache_name = policy.cache_name.as_deref();
        if policy.use_all_tags {
            self.adapter
                .evict_all(cache_name, &policy.dependency_tags)
                .await;
        } else {
            self.adapter
                .evict_any(cache_name, &policy.dependency_tags)
                .await;
        }
    }

    /// Remove the cached result of one invocation of `op`.
    pub async fn invalidate(&self, op: &CacheableOperation, args: &[ArgValue]) -> bool {
        let key = op.build_key(args);
        self.adapter.remove(key.as_str(), op.cache_name()).await
    }
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

fn lock_key(cache_name: Option<&str>, key: &CacheKey) -> String {
    match cache_name {
        Some(name) => format!("{name}\u{0}{key}"),
        None => key.as_str().to_owned(),
    }
}
