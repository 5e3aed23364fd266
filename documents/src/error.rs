//! Error types for record decoding.

use thiserror::Error;

/// Result type alias for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors raised while decoding structured records.
///
/// Building a document never fails; only decoding untyped input can.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The record carries no `kind` tag.
    #[error("record is missing its `kind` tag")]
    MissingKind,

    /// The `kind` tag names neither a resume nor a job.
    #[error("unknown record kind: {0}")]
    UnknownKind(String),

    /// The record body does not match the tagged variant.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}
