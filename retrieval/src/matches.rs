//! Match results as the HTTP layer renders them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use talentmatch_documents::{DocumentKind, EmbeddableDocument, JobRecord, ResumeRecord};

/// A resume hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeMatch {
    pub filename: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub skills: Vec<String>,
    /// `1 - distance`; not bounded below.
    pub match_score: f32,
    pub preview: String,
}

impl ResumeMatch {
    pub(crate) fn from_document(
        doc: &EmbeddableDocument,
        distance: f32,
        preview_chars: usize,
    ) -> Self {
        Self {
            filename: doc.text("filename").to_string(),
            name: doc.text("name").to_string(),
            email: doc.text("email").to_string(),
            phone: doc.text("phone").to_string(),
            skills: doc.list("skills"),
            match_score: 1.0 - distance,
            preview: doc.preview(preview_chars).to_string(),
        }
    }
}

/// A job hit. `description` holds the content preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    pub title: String,
    pub company: String,
    pub location: String,
    pub match_score: f32,
    pub description: String,
}

impl JobMatch {
    pub(crate) fn from_document(
        doc: &EmbeddableDocument,
        distance: f32,
        preview_chars: usize,
    ) -> Self {
        Self {
            title: doc.text("title").to_string(),
            company: doc.text("company").to_string(),
            location: doc.text("location").to_string(),
            match_score: 1.0 - distance,
            description: doc.preview(preview_chars).to_string(),
        }
    }
}

/// A hit from either collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchResult {
    Resume(ResumeMatch),
    Job(JobMatch),
}

impl MatchResult {
    pub(crate) fn from_document(
        kind: DocumentKind,
        doc: &EmbeddableDocument,
        distance: f32,
        preview_chars: usize,
    ) -> Self {
        match kind {
            DocumentKind::Resume => {
                MatchResult::Resume(ResumeMatch::from_document(doc, distance, preview_chars))
            }
            DocumentKind::Job => {
                MatchResult::Job(JobMatch::from_document(doc, distance, preview_chars))
            }
        }
    }

    pub fn match_score(&self) -> f32 {
        match self {
            MatchResult::Resume(m) => m.match_score,
            MatchResult::Job(m) => m.match_score,
        }
    }

    pub fn into_resume(self) -> Option<ResumeMatch> {
        match self {
            MatchResult::Resume(m) => Some(m),
            MatchResult::Job(_) => None,
        }
    }

    pub fn into_job(self) -> Option<JobMatch> {
        match self {
            MatchResult::Job(m) => Some(m),
            MatchResult::Resume(_) => None,
        }
    }
}

/// Key joining a vector entry to its relational row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinKey {
    Filename(String),
    TitleCompany { title: String, company: String },
}

impl From<&ResumeRecord> for JoinKey {
    fn from(record: &ResumeRecord) -> Self {
        JoinKey::Filename(record.filename.clone())
    }
}

impl From<&JobRecord> for JoinKey {
    fn from(record: &JobRecord) -> Self {
        JoinKey::TitleCompany {
            title: record.title.clone(),
            company: record.company.clone(),
        }
    }
}

/// Anything that can be joined back to the relational store.
pub trait JoinKeyed {
    fn join_key(&self) -> JoinKey;
}

impl JoinKeyed for ResumeMatch {
    fn join_key(&self) -> JoinKey {
        JoinKey::Filename(self.filename.clone())
    }
}

impl JoinKeyed for JobMatch {
    fn join_key(&self) -> JoinKey {
        JoinKey::TitleCompany {
            title: self.title.clone(),
            company: self.company.clone(),
        }
    }
}

impl JoinKeyed for MatchResult {
    fn join_key(&self) -> JoinKey {
        match self {
            MatchResult::Resume(m) => m.join_key(),
            MatchResult::Job(m) => m.join_key(),
        }
    }
}

/// Drop hits whose relational row no longer exists, keeping rank order.
///
/// Collections never retract entries, so callers pass the keys still live in
/// the relational store.
pub fn retain_known<T: JoinKeyed>(matches: Vec<T>, known: &HashSet<JoinKey>) -> Vec<T> {
    matches
        .into_iter()
        .filter(|m| known.contains(&m.join_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use talentmatch_documents::build_resume;

    fn job(title: &str, company: &str) -> JobMatch {
        JobMatch {
            title: title.to_string(),
            company: company.to_string(),
            location: String::new(),
            match_score: 0.5,
            description: String::new(),
        }
    }

    #[test]
    fn test_resume_match_from_document() {
        let record = ResumeRecord {
            filename: "alice.pdf".to_string(),
            name: "Alice".to_string(),
            skills: ["python", "sql"].into_iter().collect(),
            ..Default::default()
        };
        let doc = build_resume(&record);

        let m = ResumeMatch::from_document(&doc, 0.25, 11);
        assert_eq!(m.filename, "alice.pdf");
        assert_eq!(m.skills, vec!["Python", "Sql"]);
        assert_eq!(m.match_score, 0.75);
        assert_eq!(m.preview, "Name: Alice");
    }

    #[test]
    fn test_scores_below_zero_are_kept() {
        let doc = EmbeddableDocument {
            content: String::new(),
            metadata: Default::default(),
        };
        let m = JobMatch::from_document(&doc, 3.5, 300);
        assert_eq!(m.match_score, -2.5);
    }

    #[test]
    fn test_match_serializes_without_variant_tag() {
        let job = MatchResult::Job(job("Backend Engineer", "Acme"));
        let value = serde_json::to_value(job).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "title": "Backend Engineer",
                "company": "Acme",
                "location": "",
                "match_score": 0.5,
                "description": "",
            })
        );
    }

    #[test]
    fn test_retain_known_filters_stale_hits_in_order() {
        let hits = vec![job("A", "X"), job("B", "Y"), job("C", "Z")];
        let known: HashSet<JoinKey> = [&hits[2], &hits[0]]
            .into_iter()
            .map(JoinKeyed::join_key)
            .collect();

        let titles: Vec<String> = retain_known(hits, &known)
            .into_iter()
            .map(|m| m.title)
            .collect();
        assert_eq!(titles, vec!["A", "C"]);
    }
}
