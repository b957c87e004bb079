//! Provider ports
//!
//! The core consumes completion and embedding services but never implements
//! or calls them from the store/compressor layer. Adapters implementing
//! these traits own their transport, timeout, and retry discipline:
//! exponential backoff with jitter, a bounded attempt count, and retries
//! only for errors where [`ProviderError::is_retryable`] is true. Provider
//! calls must never run while a tier lock is held.

use async_trait::async_trait;
use thiserror::Error;

use crate::prompt::ChatMessage;

/// Provider failure taxonomy.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Rate limit hit; retryable after backoff
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Request deadline exceeded; retryable
    #[error("timed out: {0}")]
    Timeout(String),

    /// Transient upstream failure (5xx); retryable
    #[error("transient server error: {0}")]
    TransientServer(String),

    /// Malformed request; surface immediately
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Credential failure; surface immediately
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl ProviderError {
    /// Whether a bounded retry is appropriate for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_)
                | ProviderError::Timeout(_)
                | ProviderError::TransientServer(_)
        )
    }
}

/// A chat-completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete an ordered message list into response text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}

/// A text-embedding service.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed each text into a vector; the output is index-aligned with the
    /// input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}
