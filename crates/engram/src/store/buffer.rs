//! Short-term buffer (M tier)
//!
//! Holds the most recent turns under both a message-count bound and a total
//! token budget. A single value larger than the token budget is rejected
//! outright with [`EngramError::Oversize`] before any buffer state changes;
//! otherwise the oldest entries are evicted FIFO until the new value fits.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::{EngramError, Result};
use crate::store::fifo::FifoMap;
use crate::store::{TierStore, namespaced};
use crate::text::count_tokens;

#[derive(Debug, Clone)]
struct BufferValue {
    text: String,
    tokens: usize,
}

/// Bounded FIFO buffer of recent turn texts.
pub struct ShortTermBuffer {
    inner: Mutex<FifoMap<BufferValue>>,
    clock: Arc<dyn Clock>,
    namespace: Option<String>,
    max_messages: Option<usize>,
    max_tokens: Option<usize>,
}

impl ShortTermBuffer {
    /// Create a buffer with the given bounds and optional TTL.
    pub fn new(
        max_messages: Option<usize>,
        max_tokens: Option<usize>,
        ttl: Option<Duration>,
    ) -> Self {
        Self::with_clock(max_messages, max_tokens, ttl, Arc::new(SystemClock))
    }

    /// Create a buffer reading time from an injected clock.
    pub fn with_clock(
        max_messages: Option<usize>,
        max_tokens: Option<usize>,
        ttl: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            // Capacity is enforced here with token awareness, not by the map.
            inner: Mutex::new(FifoMap::new(None, ttl)),
            clock,
            namespace: None,
            max_messages,
            max_tokens,
        }
    }

    /// Prefix all keys with a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Check whether a value could ever be stored, without mutating state.
    ///
    /// Callers that must avoid partial multi-tier writes check this before
    /// touching any other tier.
    pub fn check_fits(&self, text: &str) -> Result<()> {
        if let Some(max_tokens) = self.max_tokens {
            let tokens = count_tokens(text);
            if tokens > max_tokens {
                return Err(EngramError::Oversize { tokens, max_tokens });
            }
        }
        Ok(())
    }

    /// Total token count of live entries.
    pub fn token_count(&self) -> usize {
        let now = self.clock.now();
        self.inner
            .lock()
            .iter_in_order(now)
            .map(|(_, v)| v.tokens)
            .sum()
    }

    /// Live entry texts in insertion order.
    pub fn contents(&self) -> Vec<String> {
        let now = self.clock.now();
        self.inner
            .lock()
            .iter_in_order(now)
            .map(|(_, v)| v.text.clone())
            .collect()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let purged = self.inner.lock().purge_expired(now);
        if purged > 0 {
            tracing::debug!(purged, "short-term buffer expired entries removed");
        }
        purged
    }
}

impl TierStore for ShortTermBuffer {
    type Value = String;

    fn get(&self, key: &str) -> Option<String> {
        let key = namespaced(self.namespace.as_deref(), key);
        let now = self.clock.now();
        self.inner.lock().get(&key, now).map(|v| v.text.clone())
    }

    /// Eviction order on every put: oversize rejection, then the message
    /// bound, then the token bound.
    fn put(&self, key: &str, value: String) -> Result<()> {
        let tokens = count_tokens(&value);
        if let Some(max_tokens) = self.max_tokens {
            if tokens > max_tokens {
                return Err(EngramError::Oversize { tokens, max_tokens });
            }
        }

        let key = namespaced(self.namespace.as_deref(), key);
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.purge_expired(now);

        let mut evicted = 0usize;
        if let Some(max_messages) = self.max_messages {
            while inner.len() >= max_messages && inner.pop_front().is_some() {
                evicted += 1;
            }
        }
        if let Some(max_tokens) = self.max_tokens {
            let mut current: usize = inner.iter_in_order(now).map(|(_, v)| v.tokens).sum();
            while current + tokens > max_tokens {
                match inner.pop_front() {
                    Some((_, old)) => {
                        current -= old.tokens;
                        evicted += 1;
                    }
                    None => break,
                }
            }
        }
        if evicted > 0 {
            tracing::debug!(evicted, tokens, "short-term buffer evicted oldest entries");
        }

        inner.insert(&key, BufferValue { text: value, tokens }, None, now);
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
