//! Records decoded from extraction output flatten into stable documents.

use pretty_assertions::assert_eq;
use talentmatch_documents::{
    DocumentError, DocumentKind, EmbeddableDocument, StructuredRecord, analyze_resume, build,
};

const EXTRACTED_RESUME: &str = r#"{
    "kind": "resume",
    "filename": "alice_20240501_120000.pdf",
    "name": "Alice Example",
    "email": "alice@example.com",
    "phone": null,
    "skills": ["python", "SQL", "Python", "docker"],
    "experience": "Backend engineer at Acme, 2021-2024",
    "education": "BSc Computer Science",
    "raw_text": "Alice Example\nalice@example.com\nExperience\nBackend engineer",
    "uploaded_by": "recruiter@example.com",
    "uploaded_at": "2024-05-01T12:00:00Z"
}"#;

const EXTRACTED_JOB: &str = r#"{
    "kind": "job",
    "title": "Backend Engineer",
    "company": "Acme",
    "location": "Remote",
    "description": "Build and operate Python services",
    "requirements": "Python, SQL",
    "posted_by": "hr@example.com"
}"#;

#[test]
fn resume_from_extraction_output() {
    let record = StructuredRecord::from_json(EXTRACTED_RESUME).unwrap();
    assert_eq!(record.kind(), DocumentKind::Resume);

    let doc = build(&record);
    assert_eq!(
        doc.content,
        "Name: Alice Example\n\
         Email: alice@example.com\n\
         Phone: \n\
         Skills: Python, Sql, Docker\n\
         Experience: Backend engineer at Acme, 2021-2024\n\
         Education: BSc Computer Science\n\
         Raw Text: Alice Example\nalice@example.com\nExperience\nBackend engineer\n"
    );
    assert_eq!(doc.text("filename"), "alice_20240501_120000.pdf");
    assert_eq!(doc.text("phone"), "");
    assert_eq!(doc.list("skills"), vec!["Python", "Sql", "Docker"]);
    assert_eq!(doc.text("uploaded_at"), "2024-05-01T12:00:00Z");
    assert_eq!(doc.kind(), Some(DocumentKind::Resume));
}

#[test]
fn job_from_extraction_output() {
    let doc = build(&StructuredRecord::from_json(EXTRACTED_JOB).unwrap());

    assert_eq!(
        doc.content,
        "Title: Backend Engineer\n\
         Company: Acme\n\
         Location: Remote\n\
         Description: Build and operate Python services\n\
         Requirements: Python, SQL\n"
    );
    let keys: Vec<&str> = doc.metadata.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["company", "location", "posted_at", "posted_by", "title", "type"]
    );
}

#[test]
fn document_survives_a_json_round_trip() {
    let doc = build(&StructuredRecord::from_json(EXTRACTED_RESUME).unwrap());
    let json = serde_json::to_string(&doc).unwrap();
    let decoded: EmbeddableDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, doc);
}

#[test]
fn untagged_and_mistagged_records_are_rejected() {
    assert!(matches!(
        StructuredRecord::from_json(r#"{"title": "Backend Engineer"}"#),
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
    assert!(matches!(
        StructuredRecord::from_json("not json"),
        Err(DocumentError::Malformed(_))
    ));
}

#[test]
fn analysis_of_extracted_raw_text() {
    let record = StructuredRecord::from_json(EXTRACTED_RESUME).unwrap();
    let StructuredRecord::Resume(resume) = record else {
        panic!("expected a resume");
    };

    let analysis = analyze_resume(&resume.raw_text);
    assert!(analysis.has_contact);
    assert_eq!(analysis.sections_found, vec!["experience"]);
    assert_eq!(
        analysis.suggestions,
        vec!["Add a Skills section to highlight your abilities"]
    );
}
