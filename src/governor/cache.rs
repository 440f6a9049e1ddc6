//! TTL response cache.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::{Duration, Instant};

struct CacheEntry {
    body: Arc<Value>,
    created: Instant,
}

/// Decoded upstream responses keyed by request identity.
///
/// Entries older than the TTL are treated as absent and removed when looked
/// up. Writes that push the size past the prune threshold sweep out expired
/// entries; live entries are never evicted.
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    prune_threshold: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, prune_threshold: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            prune_threshold,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if now.duration_since(entry.created) < self.ttl => {
                return Some(Arc::clone(&entry.body));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: String, body: Arc<Value>) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key,
            CacheEntry {
                body,
                created: Instant::now(),
            },
        );
        if self.entries.len() > self.prune_threshold {
            self.prune_expired();
        }
    }

    /// Remove expired entries.
    pub fn prune_expired(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, entry| now.duration_since(entry.created) < self.ttl);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
