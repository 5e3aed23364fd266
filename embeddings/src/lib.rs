//! # Embeddings
//!
//! Text embedding and vector similarity for talentmatch.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors through an
//!   [`EmbeddingProvider`]
//! - **Local Hashing Provider**: Deterministic, offline feature-hashing vectors
//! - **Sentence Transformers**: MiniLM-style encoders run on the CPU via candle
//! - **Remote Providers**: Any OpenAI-compatible `/embeddings` endpoint
//! - **Exact k-NN**: [`VectorIndex`] ranks stored vectors by a pinned
//!   [`DistanceMetric`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► VectorIndex                │
//! │       │                                   │                     │
//! │       ▼                                   ▼                     │
//! │  Hashing/MiniLM/OpenAI             DistanceMetric               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod index;
pub mod provider;
pub mod sentence;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use index::{Neighbor, VectorIndex};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HashingProvider, OpenAIProvider,
};
pub use sentence::SentenceTransformerProvider;
pub use similarity::{DistanceMetric, cosine_similarity, normalize, squared_l2};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Width of the local hashing provider, matching `all-MiniLM-L6-v2`.
pub const DEFAULT_DIMENSION: usize = 384;
