//! Configuration for Engram
//!
//! Per-tier settings share one shape: `enabled`, `capacity`, `ttl_secs`,
//! `max_messages`, `max_tokens`, `namespace`. Unset fields fall back to the
//! defaults the engine applies for that tier.

use serde::Deserialize;

use crate::error::{EngramError, Result};

/// Main configuration structure for Engram
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngramConfig {
    /// Session cache (S tier) settings
    #[serde(default)]
    pub session: TierSettings,
    /// Short-term buffer (M tier) settings
    #[serde(default)]
    pub buffer: TierSettings,
    /// Long-term vector store (L tier) settings
    #[serde(default)]
    pub vector: TierSettings,
    /// Cold store settings
    #[serde(default)]
    pub cold: TierSettings,
    /// Prompt assembly settings
    #[serde(default)]
    pub prompt: PromptConfig,
}

impl EngramConfig {
    /// Parse a TOML configuration document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| EngramError::Config(e.to_string()))
    }
}

/// Settings recognized for every tier
#[derive(Debug, Clone, Deserialize)]
pub struct TierSettings {
    /// Whether the tier participates in reads and writes
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum entry count (unbounded when unset)
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Default entry TTL in seconds (no expiry when unset)
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// Message-count bound (buffer tier)
    #[serde(default)]
    pub max_messages: Option<usize>,
    /// Total token bound (buffer tier)
    #[serde(default)]
    pub max_tokens: Option<usize>,
    /// Key namespace prefix
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Default for TierSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            capacity: None,
            ttl_secs: None,
            max_messages: None,
            max_tokens: None,
            namespace: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Prompt assembly settings
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    /// Default token budget applied when a build request gives none
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
        }
    }
}

fn default_token_budget() -> usize {
    4096
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngramConfig::default();
        assert!(config.session.enabled);
        assert!(config.buffer.enabled);
        assert!(config.session.capacity.is_none());
        assert_eq!(config.prompt.token_budget, 4096);
    }

    #[test]
    fn test_parse_full_toml() {
        let raw = r#"
            [session]
            capacity = 100
            ttl_secs = 1800

            [buffer]
            max_messages = 50
            max_tokens = 2048
            namespace = "chat"

            [vector]
            capacity = 10000

            [cold]
            enabled = false

            [prompt]
            token_budget = 8192
        "#;
        let config = EngramConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.session.capacity, Some(100));
        assert_eq!(config.session.ttl_secs, Some(1800));
        assert_eq!(config.buffer.max_messages, Some(50));
        assert_eq!(config.buffer.max_tokens, Some(2048));
        assert_eq!(config.buffer.namespace.as_deref(), Some("chat"));
        assert_eq!(config.vector.capacity, Some(10000));
        assert!(!config.cold.enabled);
        assert_eq!(config.prompt.token_budget, 8192);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngramConfig::from_toml_str("[buffer]\nmax_messages = 10\n").unwrap();
        assert_eq!(config.buffer.max_messages, Some(10));
        assert!(config.buffer.enabled);
        assert!(config.session.ttl_secs.is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = EngramConfig::from_toml_str("session = \"not a table\"").unwrap_err();
        assert!(matches!(err, EngramError::Config(_)));
    }
}
