//! Memory types for the Engram system
//!
//! Defines the unit of stored context ([`MemoryItem`]) and the status labels
//! attached to dialogue turns at write time.

pub mod lifecycle;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key carrying the turn's role.
pub const META_ROLE: &str = "role";
/// Metadata key carrying the turn's [`TurnStatus`].
pub const META_STATUS: &str = "status";
/// Metadata key marking an item as a compression product.
pub const META_COMPRESSED: &str = "compressed";
/// Metadata key holding the pre-compression content of an item.
pub const META_ORIGINAL_CONTENT: &str = "original_content";

/// A single unit of conversational memory.
///
/// Items are created when a turn is written and are never mutated in place:
/// compression produces new items that reference their original content
/// through [`META_ORIGINAL_CONTENT`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// The stored text
    pub content: String,
    /// Role, status, and compression annotations
    pub metadata: BTreeMap<String, Value>,
    /// When this item was created
    pub timestamp: DateTime<Utc>,
}

impl MemoryItem {
    /// Create an item timestamped now.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_timestamp(content, BTreeMap::new(), Utc::now())
    }

    /// Create an item with explicit metadata and timestamp.
    pub fn with_timestamp(
        content: impl Into<String>,
        metadata: BTreeMap<String, Value>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            content: content.into(),
            metadata,
            timestamp,
        }
    }

    /// Attach a metadata entry, consuming and returning the item.
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The role recorded for this item, if any.
    pub fn role(&self) -> Option<&str> {
        self.metadata.get(META_ROLE).and_then(Value::as_str)
    }

    /// The status label recorded for this item, if any.
    pub fn status(&self) -> Option<TurnStatus> {
        self.metadata
            .get(META_STATUS)
            .and_then(Value::as_str)
            .and_then(TurnStatus::parse)
    }
}

/// Status assigned to a turn by heuristic inspection at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStatus {
    /// Nothing noteworthy
    Ok,
    /// Likely refusal or safe-completion
    Warn,
    /// Contains an error message or stack trace
    Err,
}

impl TurnStatus {
    /// String form stored in item metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Ok => "OK",
            TurnStatus::Warn => "WARN",
            TurnStatus::Err => "ERR",
        }
    }

    /// Parse the metadata string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(TurnStatus::Ok),
            "WARN" => Some(TurnStatus::Warn),
            "ERR" => Some(TurnStatus::Err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_item_serialization() {
        let item = MemoryItem::new("Test content")
            .with_meta(META_ROLE, "user")
            .with_meta(META_STATUS, "OK");

        let json = serde_json::to_string(&item).expect("Failed to serialize item");
        let back: MemoryItem = serde_json::from_str(&json).expect("Failed to deserialize item");

        assert_eq!(item, back);
    }

    #[test]
    fn test_memory_item_role_and_status() {
        let item = MemoryItem::new("hello")
            .with_meta(META_ROLE, "assistant")
            .with_meta(META_STATUS, TurnStatus::Warn.as_str());

        assert_eq!(item.role(), Some("assistant"));
        assert_eq!(item.status(), Some(TurnStatus::Warn));
    }

    #[test]
    fn test_memory_item_missing_metadata() {
        let item = MemoryItem::new("bare");
        assert!(item.role().is_none());
        assert!(item.status().is_none());
    }

    #[test]
    fn test_turn_status_round_trip() {
        for status in [TurnStatus::Ok, TurnStatus::Warn, TurnStatus::Err] {
            assert_eq!(TurnStatus::parse(status.as_str()), Some(status));
        }
        assert!(TurnStatus::parse("UNKNOWN").is_none());
    }
}
