//! Session cache (S tier)
//!
//! Keyed by session/conversation id, holding each session's full ordered
//! turn history. TTL plus FIFO capacity eviction, with per-key TTL override.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::store::fifo::FifoMap;
use crate::store::{TierStore, namespaced};

/// FIFO + TTL cache for per-session values.
pub struct SessionCache<V> {
    inner: Mutex<FifoMap<V>>,
    clock: Arc<dyn Clock>,
    namespace: Option<String>,
}

impl<V: Clone> SessionCache<V> {
    /// Create a cache with the given capacity and default TTL (both optional).
    pub fn new(capacity: Option<usize>, ttl: Option<Duration>) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    /// Create a cache reading time from an injected clock.
    pub fn with_clock(
        capacity: Option<usize>,
        ttl: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Mutex::new(FifoMap::new(capacity, ttl)),
            clock,
            namespace: None,
        }
    }

    /// Prefix all keys with a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Insert with a TTL override for this entry only.
    pub fn put_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let key = namespaced(self.namespace.as_deref(), key);
        let now = self.clock.now();
        self.inner.lock().insert(&key, value, Some(ttl), now);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let purged = self.inner.lock().purge_expired(now);
        if purged > 0 {
            tracing::debug!(purged, "session cache expired entries removed");
        }
        purged
    }

    /// Snapshot of live entries in insertion order.
    pub fn snapshot(&self) -> Vec<(String, V)> {
        let now = self.clock.now();
        self.inner
            .lock()
            .iter_in_order(now)
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

impl<V: Clone> TierStore for SessionCache<V> {
    type Value = V;

    fn get(&self, key: &str) -> Option<V> {
        let key = namespaced(self.namespace.as_deref(), key);
        let now = self.clock.now();
        self.inner.lock().get(&key, now).cloned()
    }

    fn put(&self, key: &str, value: V) -> Result<()> {
        let key = namespaced(self.namespace.as_deref(), key);
        let now = self.clock.now();
        self.inner.lock().insert(&key, value, None, now);
        Ok(())
    }

    fn delete(&self, key: &str) {
        let key = namespaced(self.namespace.as_deref(), key);
        self.inner.lock().remove(&key);
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
