//! Error types for the retrieval engine.

use std::path::PathBuf;

use thiserror::Error;

use talentmatch_documents::DocumentError;
use talentmatch_embeddings::EmbeddingError;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval engine.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The embedding function cannot be constructed or invoked.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    /// A collection could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Rejected before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Whether the caller is at fault (4xx) rather than the service (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, RetrievalError::InvalidArgument(_))
    }
}

impl From<DocumentError> for RetrievalError {
    fn from(err: DocumentError) -> Self {
        RetrievalError::InvalidArgument(err.to_string())
    }
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create a collection directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a collection file.
    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a collection file.
    #[error("failed to write {}: {source}", path.display())]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored line could not be decoded.
    #[error("corrupt entry at {}:{line}: {reason}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The collection on disk was built with a different model, width or metric.
    #[error("incompatible collection {name}: {reason}")]
    Incompatible { name: String, reason: String },

    /// Serialization of an entry failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
