//! # Retrieval Engine
//!
//! Semantic matching between resumes and job postings. The engine owns two
//! persistent vector collections and answers top-k similarity queries over
//! either of them:
//!
//! ```text
//!   StructuredRecord ──build──▶ EmbeddableDocument ──index──┐
//!                                                            ▼
//!                        ┌──────────────────────────────────────────┐
//!                        │             RetrievalEngine              │
//!                        │                                          │
//!                        │  EmbeddingProvider   resumes/   jobs/    │
//!                        │   (text → vector)    ├ manifest.json     │
//!                        │                      └ documents.jsonl   │
//!                        └──────────────────────────────────────────┘
//!                                                            │
//!   free-text query ──────────────────────search────────────┘──▶ Vec<MatchResult>
//! ```
//!
//! `match_score` is `1 - distance` under the configured metric. With the
//! default cosine metric it equals cosine similarity; callers must not assume
//! it is bounded below by zero.
//!
//! Collections are append-only. Deleting a relational row does not retract
//! its vector; filter stale hits with [`retain_known`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use talentmatch_retrieval::{EngineConfig, RetrievalEngine};
//!
//! let engine = RetrievalEngine::open(EngineConfig::new("/var/lib/talentmatch")).await?;
//! engine.index_resume(&resume).await?;
//!
//! let matches = engine.search_resumes("Python SQL backend engineer", 5).await?;
//! ```

pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod matches;

pub use collection::{Collection, CollectionManifest, CollectionName, Hit};
pub use config::{EmbeddingConfig, EmbeddingProviderType, EngineConfig, PreviewConfig};
pub use engine::{EngineStats, RetrievalEngine, RetrievalEngineBuilder};
pub use error::{Result, RetrievalError, StorageError};
pub use matches::{JobMatch, JoinKey, JoinKeyed, MatchResult, ResumeMatch, retain_known};

// Re-export from dependencies for convenience
pub use talentmatch_documents::{
    EmbeddableDocument, JobRecord, ResumeRecord, StructuredRecord, analyze_resume,
};
pub use talentmatch_embeddings::{DistanceMetric, EmbeddingProvider, HashingProvider};
pub use tokio_util::sync::CancellationToken;
