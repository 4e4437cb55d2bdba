// Time-bounded memoization of query results, keyed by the exact argument list

use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry<R> {
    records: Vec<R>,
    created: Instant,
}

/// Per-kind query cache.
///
/// An entry is live while `now < created + timeout`. Expired entries are
/// masked rather than evicted; they are replaced on the next `put` or dropped
/// by `clear`. Without a timeout every lookup misses.
pub struct ResultCache<R> {
    entries: HashMap<Vec<String>, CacheEntry<R>>,
    timeout: Option<Duration>,
}

impl<R: Clone> ResultCache<R> {
    pub fn new(timeout: Option<Duration>) -> Self {
        ResultCache {
            entries: HashMap::new(),
            timeout: timeout.filter(|t| !t.is_zero()),
        }
    }

    pub fn disabled() -> Self {
        ResultCache::new(None)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout.is_some()
    }

    /// A zero or absent timeout disables caching and drops every entry.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout.filter(|t| !t.is_zero());
        if self.timeout.is_none() {
            self.entries.clear();
        }
    }

    pub fn contains(&self, key: &[String]) -> bool {
        match (self.timeout, self.entries.get(key)) {
            (Some(timeout), Some(entry)) => entry.created.elapsed() < timeout,
            _ => false,
        }
    }

    /// Copy of the live entry for `key`, if any.
    pub fn get(&self, key: &[String]) -> Option<Vec<R>> {
        if !self.contains(key) {
            return None;
        }
        self.entries.get(key).map(|entry| entry.records.clone())
    }

    pub fn put(&mut self, key: Vec<String>, records: &[R]) {
        if !self.is_enabled() {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                records: records.to_vec(),
                created: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R: Clone> Default for ResultCache<R> {
    fn default() -> Self {
        ResultCache::disabled()
    }
}
