// src/utils/cache.rs

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Time-expired read cache for hot list endpoints (leaderboards, admin views).
///
/// Entries expire by TTL only; writes elsewhere in the system do NOT
/// invalidate them, so readers may observe data up to `ttl` stale. That
/// staleness window is an accepted trade-off for the read-heavy views this
/// backs. The cache is owned by `AppState` and passed by reference, never a
/// module-level global.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value if present and not expired.
    /// Expired entries are removed on access.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((inserted, value)) if inserted.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key, (Instant::now(), value));
    }

    /// Drops every entry. Only used by tests and by explicit admin actions;
    /// normal operation relies on TTL expiry alone.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
