//! # Documents
//!
//! Turns structured resume and job records into embeddable documents.
//!
//! A [`StructuredRecord`] arrives from field extraction with every field
//! present (empty when extraction failed). [`build`] flattens it into an
//! [`EmbeddableDocument`]: labeled lines in a fixed order for embedding, plus
//! a metadata side-table for rebuilding result cards without touching the
//! relational store.
//!
//! ```rust
//! use talentmatch_documents::{build, ResumeRecord, StructuredRecord};
//!
//! let record = StructuredRecord::Resume(ResumeRecord {
//!     name: "Alice".to_string(),
//!     skills: ["Python", "SQL"].into_iter().collect(),
//!     experience: "3 years backend".to_string(),
//!     ..Default::default()
//! });
//!
//! let doc = build(&record);
//! assert!(doc.content.starts_with("Name: Alice\n"));
//! ```

pub mod analysis;
pub mod builder;
pub mod document;
pub mod error;
pub mod record;

pub use analysis::{ResumeAnalysis, analyze_resume};
pub use builder::{build, build_job, build_resume};
pub use document::{DocumentKind, EmbeddableDocument, Metadata, MetadataValue};
pub use error::{DocumentError, Result};
pub use record::{JobRecord, ResumeRecord, SkillSet, StructuredRecord};
