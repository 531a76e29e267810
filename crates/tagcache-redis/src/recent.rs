//! Keys this process wrote a moment ago.
//!
//! A remote write fires an expiration-set notification back at the writer.
//! The window lets the writer recognise its own echo and skip refetching a
//! value it already holds.

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug)]
pub struct RecentWrites {
    keys: DashMap<String, Instant>,
    window: Duration,
}

impl RecentWrites {
    pub fn new(window: Duration) -> Self {
        Self {
            keys: DashMap::new(),
            window,
        }
    }

    /// Record a write of `key` starting now.
    pub fn record(&self, key: &str) {
        if let Some(until) = Instant::now().checked_add(self.window) {
            self.keys.insert(key.to_owned(), until);
        }
    }

    /// Consume the window entry of `key`; `true` when it was still open.
    pub fn consume(&self, key: &str) -> bool {
        self.keys
            .remove(key)
            .is_some_and(|(_, until)| until > Instant::now())
    }

    pub fn forget(&self, key: &str) {
        self.keys.remove(key);
    }

    /// Drop closed windows.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.keys.len();
        self.keys.retain(|_, until| *until > now);
        before.saturating_sub(self.keys.len())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
