//! Error types for Engram

use thiserror::Error;

/// Main error type for Engram operations
#[derive(Error, Debug)]
pub enum EngramError {
    /// A single value is too large for a bounded tier. The value is rejected
    /// before any buffer state changes.
    #[error("value of {tokens} tokens exceeds the buffer limit of {max_tokens}")]
    Oversize {
        /// Token length of the rejected value
        tokens: usize,
        /// Configured per-tier token ceiling
        max_tokens: usize,
    },

    /// A template id was given but no template is registered under it
    #[error("unknown template: {0}")]
    TemplateNotFound(String),

    /// A template references a slot that has no fill value
    #[error("template '{template}' references unknown slot '{slot}'")]
    MissingSlot {
        /// Template the slot appeared in
        template: String,
        /// The unfilled slot name
        slot: String,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Negative-example vault persistence errors
    #[error("vault error: {0}")]
    Vault(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Engram operations
pub type Result<T> = std::result::Result<T, EngramError>;
