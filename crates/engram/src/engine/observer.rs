//! Typed engine observers
//!
//! A plain trait-object list dispatched synchronously in registration order.
//! Observers must return quickly; the engine calls them outside tier locks
//! but on the caller's thread.

use crate::memory::MemoryItem;

/// Callbacks fired by the [`ContextEngine`](crate::engine::ContextEngine).
///
/// All methods have no-op defaults; implement the ones of interest.
pub trait EngineObserver: Send + Sync {
    /// A turn was written into the session history.
    fn on_turn_written(&self, _session_id: &str, _item: &MemoryItem) {}

    /// A context read compressed its item sequence.
    fn on_context_compressed(&self, _before: usize, _after: usize) {}
}
