//! Record to document flattening.
//!
//! Content is a fixed sequence of `Label: value` lines. Empty fields still get
//! their line so the layout the embedding model sees never shifts with data
//! completeness.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::document::{DocumentKind, EmbeddableDocument, Metadata, MetadataValue, TYPE_KEY};
use crate::record::{JobRecord, ResumeRecord, StructuredRecord};

/// Build the embeddable document for any record.
pub fn build(record: &StructuredRecord) -> EmbeddableDocument {
    match record {
        StructuredRecord::Resume(resume) => build_resume(resume),
        StructuredRecord::Job(job) => build_job(job),
    }
}

pub fn build_resume(resume: &ResumeRecord) -> EmbeddableDocument {
    let skills = resume.skills.as_slice().join(", ");

    let content = labeled_lines(&[
        ("Name", resume.name.as_str()),
        ("Email", resume.email.as_str()),
        ("Phone", resume.phone.as_str()),
        ("Skills", skills.as_str()),
        ("Experience", resume.experience.as_str()),
        ("Education", resume.education.as_str()),
        ("Raw Text", resume.raw_text.as_str()),
    ]);

    // Skills go in as JSON text; scalar-only stores cannot hold lists.
    let skills_json =
        serde_json::to_string(resume.skills.as_slice()).unwrap_or_else(|_| "[]".to_string());

    let metadata = metadata(&[
        ("filename", resume.filename.clone()),
        ("name", resume.name.clone()),
        ("email", resume.email.clone()),
        ("phone", resume.phone.clone()),
        ("skills", skills_json),
        ("uploaded_by", resume.uploaded_by.clone()),
        ("uploaded_at", timestamp(resume.uploaded_at)),
        (TYPE_KEY, DocumentKind::Resume.as_str().to_string()),
    ]);

    EmbeddableDocument { content, metadata }
}

pub fn build_job(job: &JobRecord) -> EmbeddableDocument {
    let content = labeled_lines(&[
        ("Title", job.title.as_str()),
        ("Company", job.company.as_str()),
        ("Location", job.location.as_str()),
        ("Description", job.description.as_str()),
        ("Requirements", job.requirements.as_str()),
    ]);

    let metadata = metadata(&[
        ("title", job.title.clone()),
        ("company", job.company.clone()),
        ("location", job.location.clone()),
        ("posted_by", job.posted_by.clone()),
        ("posted_at", timestamp(job.posted_at)),
        (TYPE_KEY, DocumentKind::Job.as_str().to_string()),
    ]);

    EmbeddableDocument { content, metadata }
}

fn labeled_lines(fields: &[(&str, &str)]) -> String {
    let mut content = String::new();
    for (label, value) in fields {
        content.push_str(label);
        content.push_str(": ");
        content.push_str(value);
        content.push('\n');
    }
    content
}

fn metadata(entries: &[(&str, String)]) -> Metadata {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), MetadataValue::Text(value.clone())))
        .collect()
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}
