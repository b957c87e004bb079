//! Cold store (archival tier)
//!
//! Unlimited by default; FIFO capacity eviction only when a capacity is
//! configured. No TTL. Holds arbitrary JSON payloads, which makes it the
//! archive target for artifact data.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::store::fifo::FifoMap;
use crate::store::{TierStore, namespaced};

/// Archival key-value store.
pub struct ColdStore {
    inner: Mutex<FifoMap<Value>>,
    clock: Arc<dyn Clock>,
    namespace: Option<String>,
}

impl ColdStore {
    /// Create a store; `None` capacity means unbounded.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(FifoMap::new(capacity, None)),
            clock: Arc::new(SystemClock),
            namespace: None,
        }
    }

    /// Prefix all keys with a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl Default for ColdStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TierStore for ColdStore {
    type Value = Value;

    fn get(&self, key: &str) -> Option<Value> {
        let key = namespaced(self.namespace.as_deref(), key);
        let now = self.clock.now();
        self.inner.lock().get(&key, now).cloned()
    }

    fn put(&self, key: &str, value: Value) -> Result<()> {
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
