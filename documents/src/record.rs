//! Structured records produced by field extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::document::DocumentKind;
use crate::error::{DocumentError, Result};

/// Ordered, deduplicated, case-normalized skill names.
///
/// Each skill is trimmed, inner whitespace is collapsed, and every word is
/// title-cased (`"machine  learning"` becomes `"Machine Learning"`). The first
/// occurrence wins; later case-insensitive duplicates and blanks are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SkillSet(Vec<String>);

impl SkillSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a skill, returning false if it was blank or already present.
    pub fn insert(&mut self, skill: &str) -> bool {
        let normalized = normalize_skill(skill);
        if normalized.is_empty() || self.0.contains(&normalized) {
            return false;
        }
        self.0.push(normalized);
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize_skill(skill: &str) -> String {
    skill
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl<S: AsRef<str>> FromIterator<S> for SkillSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SkillSet::new();
        for skill in iter {
            set.insert(skill.as_ref());
        }
        set
    }
}

impl From<Vec<String>> for SkillSet {
    fn from(skills: Vec<String>) -> Self {
        skills.into_iter().collect()
    }
}

impl From<SkillSet> for Vec<String> {
    fn from(skills: SkillSet) -> Self {
        skills.0
    }
}

/// Treat an explicit JSON `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A parsed resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    /// Stored upload name; the join key shared with the relational row.
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: SkillSet,

    #[serde(default, deserialize_with = "null_as_default")]
    pub experience: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub education: String,

    /// Excerpt of the extracted document text.
    #[serde(default, deserialize_with = "null_as_default")]
    pub raw_text: String,

    /// Identity of the uploading user.
    #[serde(default, deserialize_with = "null_as_default")]
    pub uploaded_by: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub college: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub degree: String,

    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A job posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub requirements: String,

    /// Identity of the posting user.
    #[serde(default, deserialize_with = "null_as_default")]
    pub posted_by: String,

    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
}

/// A record of either kind, tagged by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuredRecord {
    Resume(ResumeRecord),
    Job(JobRecord),
}

impl StructuredRecord {
    /// Decode a tagged record from JSON text.
    ///
    /// A missing or unknown `kind` is reported separately from a malformed
    /// body so callers can reject it as a bad request.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let kind = value
            .get("kind")
            .and_then(serde_json::Value::as_str)
            .ok_or(DocumentError::MissingKind)?;

        match kind.parse::<DocumentKind>() {
            Ok(DocumentKind::Resume) => Ok(Self::Resume(serde_json::from_value(value)?)),
            Ok(DocumentKind::Job) => Ok(Self::Job(serde_json::from_value(value)?)),
            Err(_) => Err(DocumentError::UnknownKind(kind.to_string())),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            StructuredRecord::Resume(_) => DocumentKind::Resume,
            StructuredRecord::Job(_) => DocumentKind::Job,
        }
    }
}

impl From<ResumeRecord> for StructuredRecord {
    fn from(record: ResumeRecord) -> Self {
        StructuredRecord::Resume(record)
    }
}

impl From<JobRecord> for StructuredRecord {
    fn from(record: JobRecord) -> Self {
        StructuredRecord::Job(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_skills_are_normalized_and_deduplicated() {
        let skills: SkillSet = ["python", " SQL", "Python", "machine   learning", "", "sql"]
            .into_iter()
            .collect();

        assert_eq!(skills.as_slice(), ["Python", "Sql", "Machine Learning"]);
    }

    #[test]
    fn test_missing_and_null_fields_default_to_empty() {
        let record = StructuredRecord::from_json(
            r#"{"kind": "resume", "name": "Alice", "email": null, "skills": null}"#,
        )
        .unwrap();

        let StructuredRecord::Resume(resume) = record else {
            panic!("expected a resume");
        };
        assert_eq!(resume.name, "Alice");
        assert_eq!(resume.email, "");
        assert!(resume.skills.is_empty());
        assert_eq!(resume.uploaded_at, None);
    }

    #[test]
    fn test_kind_tag_is_required() {
        assert!(matches!(
            StructuredRecord::from_json(r#"{"title": "Engineer"}"#),
            Err(DocumentError::MissingKind)
        ));
        assert!(matches!(
            StructuredRecord::from_json(r#"{"kind": "student"}"#),
            Err(DocumentError::UnknownKind(kind)) if kind == "student"
        ));
        assert!(matches!(
            StructuredRecord::from_json(r#"{"kind": "job", "title": 42}"#),
            Err(DocumentError::Malformed(_))
        ));
    }

    #[test]
    fn test_job_round_trips_with_tag() {
        let job = StructuredRecord::Job(JobRecord {
            title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            ..Default::default()
        });

        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains(r#""kind":"job""#));
        assert_eq!(StructuredRecord::from_json(&json).unwrap(), job);
    }
}
