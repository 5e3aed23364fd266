//! Lightweight resume completeness checks.

use serde::{Deserialize, Serialize};

/// Sections looked for, in reporting order.
const SECTIONS: [&str; 4] = ["experience", "education", "skills", "projects"];

const CONTACT_MARKERS: [&str; 3] = ["email", "phone", "@"];

/// Summary of a resume's raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeAnalysis {
    pub word_count: usize,
    pub has_contact: bool,
    pub sections_found: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Count words, detect contact details and section headings.
///
/// Matching is a case-insensitive substring test, so a heading and a passing
/// mention of the same word count alike.
pub fn analyze_resume(text: &str) -> ResumeAnalysis {
    let lower = text.to_lowercase();

    let sections_found: Vec<String> = SECTIONS
        .iter()
        .filter(|section| lower.contains(*section))
        .map(ToString::to_string)
        .collect();

    let mut suggestions = Vec::new();
    if !sections_found.iter().any(|s| s == "experience") {
        suggestions.push("Consider adding an Experience section".to_string());
    }
    if !sections_found.iter().any(|s| s == "skills") {
        suggestions.push("Add a Skills section to highlight your abilities".to_string());
    }

    ResumeAnalysis {
        word_count: text.split_whitespace().count(),
        has_contact: CONTACT_MARKERS.iter().any(|marker| lower.contains(marker)),
        sections_found,
        suggestions,
    }
}
