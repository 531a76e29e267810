//! Per-key call deduplication.
//!
//! The first caller that misses the cache for a key takes the key's lock and
//! holds it until its result is committed or the call fails. Concurrent
//! callers for the same key wait on the lock, then find the committed value.
//! Locks are created lazily and removed again once nobody holds or waits on
//! them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Table of per-key locks.
#[derive(Debug, Default, Clone)]
pub struct StampedeLocks {
    locks: Arc<LockTable>,
}

impl StampedeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of `key`.
    pub async fn acquire(&self, key: &str) -> StampedeGuard {
        let lock = Arc::clone(&*self.locks.entry(key.to_owned()).or_default());
        let guard = lock.lock_owned().await;
        StampedeGuard {
            key: key.to_owned(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of keys with a live lock.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock of one key; released on drop.
#[derive(Debug)]
pub struct StampedeGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl StampedeGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for StampedeGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // only the table itself still references an idle lock
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
