//! Errors raised while turning text into vectors.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Embedding failures, from provider setup through vector comparison.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The provider lacks what it needs to run (API key, non-zero width).
    #[error("embedding provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// The embeddings endpoint answered with a non-success status.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP 429 from the endpoint.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Two vectors, or a vector and an index, disagree on width.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A local model could not be fetched, loaded or run.
    #[error("model error: {0}")]
    Model(String),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
