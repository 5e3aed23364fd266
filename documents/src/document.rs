//! Embeddable documents and their metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Metadata key holding the document kind discriminator.
pub const TYPE_KEY: &str = "type";

/// Which collection a document belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    Job,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::Job => "job",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resume" => Ok(DocumentKind::Resume),
            "job" => Ok(DocumentKind::Job),
            other => Err(format!("unknown document kind: {other}")),
        }
    }
}

/// A metadata value: text or a list of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        MetadataValue::List(value)
    }
}

/// Metadata side-table, ordered by key so serialization is stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// The text that gets embedded plus the fields needed to render a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddableDocument {
    /// Labeled-line flattening of the record.
    pub content: String,

    pub metadata: Metadata,
}

impl EmbeddableDocument {
    /// Kind recorded under the `type` key, if present and recognized.
    pub fn kind(&self) -> Option<DocumentKind> {
        match self.metadata.get(TYPE_KEY)? {
            MetadataValue::Text(kind) => kind.parse().ok(),
            MetadataValue::List(_) => None,
        }
    }

    /// Text value for `key`; empty when missing or list-valued.
    pub fn text(&self, key: &str) -> &str {
        match self.metadata.get(key) {
            Some(MetadataValue::Text(value)) => value,
            _ => "",
        }
    }

    /// List value for `key`.
    ///
    /// Accepts either a native list or JSON-array text, which is how list
    /// values are stored when the store only keeps scalars. Anything else
    /// yields an empty list.
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.metadata.get(key) {
            Some(MetadataValue::List(values)) => values.clone(),
            Some(MetadataValue::Text(text)) if !text.is_empty() => {
                serde_json::from_str(text).unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    /// Leading `max_chars` characters of `content`.
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.content.char_indices().nth(max_chars) {
            Some((end, _)) => &self.content[..end],
            None => &self.content,
        }
    }
}
