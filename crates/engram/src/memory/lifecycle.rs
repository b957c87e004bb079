//! Tier lifecycle management
//!
//! A periodic sweep removes TTL-expired entries from the session and buffer
//! tiers (belt-and-braces beyond the lazy per-get expiry, so long-running
//! processes stay memory-bounded), and promotion copies a buffer entry into
//! the long-term tier. No background thread is required for correctness;
//! the host schedules [`LifecycleManager::sweep`].

use std::sync::Arc;

use crate::memory::MemoryItem;
use crate::store::{LongTermVector, SessionCache, ShortTermBuffer, TierStore, VectorRecord};

/// Result of one lifecycle sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepStats {
    /// Expired entries removed from the session cache
    pub sessions_purged: usize,
    /// Expired entries removed from the short-term buffer
    pub buffer_purged: usize,
}

/// Coordinates TTL sweeps and buffer-to-long-term promotion.
pub struct LifecycleManager {
    sessions: Arc<SessionCache<Vec<MemoryItem>>>,
    buffer: Arc<ShortTermBuffer>,
    vector: Arc<LongTermVector>,
}

impl LifecycleManager {
    /// Create a manager over the engine's tiers.
    pub fn new(
        sessions: Arc<SessionCache<Vec<MemoryItem>>>,
        buffer: Arc<ShortTermBuffer>,
        vector: Arc<LongTermVector>,
    ) -> Self {
        Self {
            sessions,
            buffer,
            vector,
        }
    }

    /// Remove TTL-expired entries from the S and M tiers.
    pub fn sweep(&self) -> SweepStats {
        let stats = SweepStats {
            sessions_purged: self.sessions.purge_expired(),
            buffer_purged: self.buffer.purge_expired(),
        };
        if stats.sessions_purged > 0 || stats.buffer_purged > 0 {
            tracing::info!(
                sessions = stats.sessions_purged,
                buffer = stats.buffer_purged,
                "lifecycle sweep removed expired entries"
            );
        }
        stats
    }

    /// Copy a buffer entry into the long-term tier under the same key.
    ///
    /// Idempotent: promoting an absent key is a no-op. Returns whether a
    /// value was promoted.
    pub fn promote(&self, key: &str) -> bool {
        match self.buffer.get(key) {
            Some(text) => {
                let item = MemoryItem::new(text);
                // put never fails on the long-term tier
                let _ = self.vector.put(key, VectorRecord::Value(item));
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;

    fn manager_with_clock(clock: ManualClock) -> LifecycleManager {
        let clock = Arc::new(clock);
        LifecycleManager::new(
            Arc::new(SessionCache::with_clock(
                None,
                Some(Duration::minutes(30)),
                clock.clone(),
            )),
            Arc::new(ShortTermBuffer::with_clock(
                Some(50),
                Some(2048),
                Some(Duration::minutes(30)),
                clock,
            )),
            Arc::new(LongTermVector::new(None)),
        )
    }

    #[test]
    fn test_sweep_removes_expired_from_both_tiers() {
        let clock = ManualClock::from_epoch();
        let manager = manager_with_clock(clock.clone());
        manager
            .sessions
            .put("s1", vec![MemoryItem::new("hello")])
            .unwrap();
        manager.buffer.put("s1:1", "hello".to_string()).unwrap();

        clock.advance(Duration::minutes(31));
        let stats = manager.sweep();
        assert_eq!(stats.sessions_purged, 1);
        assert_eq!(stats.buffer_purged, 1);
        assert!(manager.sessions.is_empty());
        assert!(manager.buffer.is_empty());
    }

    #[test]
    fn test_sweep_keeps_live_entries() {
        let clock = ManualClock::from_epoch();
        let manager = manager_with_clock(clock.clone());
        manager.buffer.put("k", "fresh".to_string()).unwrap();
        clock.advance(Duration::minutes(1));
        let stats = manager.sweep();
        assert_eq!(stats.buffer_purged, 0);
        assert_eq!(manager.buffer.get("k"), Some("fresh".to_string()));
    }

    #[test]
    fn test_promote_copies_buffer_value() {
        let clock = ManualClock::from_epoch();
        let manager = manager_with_clock(clock);
        manager.buffer.put("hot", "important fact".to_string()).unwrap();

        assert!(manager.promote("hot"));
        let record = manager.vector.get("hot").expect("promoted record");
        assert_eq!(record.payload().content, "important fact");
        // The buffer keeps its copy; promotion is a copy, not a move.
        assert!(manager.buffer.get("hot").is_some());
    }

    #[test]
    fn test_promote_absent_key_is_noop() {
        let clock = ManualClock::from_epoch();
        let manager = manager_with_clock(clock);
        assert!(!manager.promote("missing"));
        assert!(manager.vector.is_empty());
    }

    #[test]
    fn test_promote_is_idempotent() {
        let clock = ManualClock::from_epoch();
        let manager = manager_with_clock(clock);
        manager.buffer.put("k", "v".to_string()).unwrap();
        assert!(manager.promote("k"));
        assert!(manager.promote("k"));
        assert_eq!(manager.vector.len(), 1);
    }
}
