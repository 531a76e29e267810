//! Dependency-tag index: tag → set of cache keys.
//!
//! The index is best effort. A key may still be listed under a tag after its
//! entry expired, so callers removing the resulting keys must tolerate keys
//! that are already gone.

use std::collections::HashSet;

use dashmap::DashMap;

/// Concurrent tag → keys index.
///
/// Bucket creation and mutation of a tag's key set are both guarded by the
/// owning DashMap shard, so concurrent `add` calls never lose keys.
#[derive(Debug, Default)]
pub struct TagIndex {
    tag_keys: DashMap<String, HashSet<String>>,
    key_tags: DashMap<String, Vec<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under every tag in `tags`.
    ///
    /// Tags from a previous registration of the same key that are not in
    /// `tags` are detached, so a re-set entry only answers to its latest tags.
    pub fn add(&self, key: &str, tags: &[String]) {
        let previous = if tags.is_empty() {
            self.key_tags.remove(key).map(|(_, prev)| prev)
        } else {
            self.key_tags.insert(key.to_owned(), tags.to_vec())
        };

        if let Some(previous) = previous {
            for tag in previous.iter().filter(|t| !tags.contains(*t)) {
                self.detach(tag, key);
            }
        }

        for tag in tags {
            self.tag_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.to_owned());
        }
    }

    /// Drop every reference to `key`.
    pub fn forget(&self, key: &str) {
        if let Some((_, tags)) = self.key_tags.remove(key) {
            for tag in &tags {
                self.detach(tag, key);
            }
        }
    }

    fn detach(&self, tag: &str, key: &str) {
        if let Some(mut keys) = self.tag_keys.get_mut(tag) {
            keys.remove(key);
        }
        self.tag_keys.remove_if(tag, |_, keys| keys.is_empty());
    }

    /// Keys listed under every tag (intersection).
    ///
    /// Empty when `tags` is empty or when any tag is unknown.
    pub fn keys_with_all(&self, tags: &[String]) -> Vec<String> {
        let mut result: Option<HashSet<String>> = None;

        for tag in tags {
            let Some(keys) = self.tag_keys.get(tag) else {
                return Vec::new();
            };
            result = Some(match result {
                None => HashSet::clone(&keys),
                Some(acc) => acc.intersection(&keys).cloned().collect(),
            });
            if result.as_ref().is_some_and(HashSet::is_empty) {
                return Vec::new();
            }
        }

        result.map(|set| set.into_iter().collect()).unwrap_or_default()
    }

    /// Keys listed under at least one tag (union).
    pub fn keys_with_any(&self, tags: &[String]) -> Vec<String> {
        let mut result = HashSet::new();
        for tag in tags {
            if let Some(keys) = self.tag_keys.get(tag) {
                result.extend(keys.iter().cloned());
            }
        }
        result.into_iter().collect()
    }

    /// Keys currently listed under `tag`.
    pub fn keys_for(&self, tag: &str) -> Vec<String> {
        self.tag_keys
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of tags with at least one key.
    pub fn tag_count(&self) -> usize {
        self.tag_keys.len()
    }

    pub fn clear(&self) {
        self.tag_keys.clear();
        self.key_tags.clear();
    }
}
