//! Persistent, append-only vector collections.
//!
//! Each collection lives in its own directory:
//!
//! ```text
//! <root>/<name>/
//!     manifest.json     model, dimension and metric the vectors were built with
//!     documents.jsonl   one JSON entry per line, in insertion order
//! ```
//!
//! An entry is appended as a single line and synced before the call returns.
//! A line left unterminated by a crash is dropped (and truncated away) the
//! next time the collection is opened; any other undecodable line is reported
//! as corruption rather than skipped.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use talentmatch_documents::{DocumentKind, EmbeddableDocument, Metadata};
use talentmatch_embeddings::{DistanceMetric, Embedding, EmbeddingError, VectorIndex};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, RetrievalError, StorageError};

const MANIFEST_FILE: &str = "manifest.json";
const LOG_FILE: &str = "documents.jsonl";

/// The two collections the engine serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionName {
    Resumes,
    Jobs,
}

impl CollectionName {
    pub const ALL: [CollectionName; 2] = [CollectionName::Resumes, CollectionName::Jobs];

    pub fn as_str(self) -> &'static str {
        match self {
            CollectionName::Resumes => "resumes",
            CollectionName::Jobs => "jobs",
        }
    }

    /// Document kind accepted by this collection.
    pub fn kind(self) -> DocumentKind {
        match self {
            CollectionName::Resumes => DocumentKind::Resume,
            CollectionName::Jobs => DocumentKind::Job,
        }
    }

    pub fn for_kind(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Resume => CollectionName::Resumes,
            DocumentKind::Job => CollectionName::Jobs,
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionName {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resumes" => Ok(CollectionName::Resumes),
            "jobs" => Ok(CollectionName::Jobs),
            other => Err(RetrievalError::InvalidArgument(format!(
                "unknown collection: {other}"
            ))),
        }
    }
}

/// What the stored vectors were produced with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionManifest {
    pub name: CollectionName,
    pub model: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub created_at: DateTime<Utc>,
}

impl CollectionManifest {
    fn check_compatible(&self, expected: &CollectionManifest) -> Result<()> {
        let reason = if self.name != expected.name {
            Some(format!("manifest names collection {}", self.name))
        } else if self.dimension != expected.dimension {
            Some(format!(
                "stored dimension {} but provider emits {}",
                self.dimension, expected.dimension
            ))
        } else if self.metric != expected.metric {
            Some(format!(
                "stored metric {} but engine uses {}",
                self.metric, expected.metric
            ))
        } else if self.model != expected.model {
            Some(format!(
                "stored model {} but provider uses {}",
                self.model, expected.model
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(StorageError::Incompatible {
                name: expected.name.to_string(),
                reason,
            }
            .into()),
            None => Ok(()),
        }
    }
}

/// One line of `documents.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    seq: u64,
    content: String,
    metadata: Metadata,
    embedding: Embedding,
}

/// A stored document and its distance to a query.
#[derive(Debug, Clone)]
pub struct Hit {
    pub seq: u64,
    pub document: EmbeddableDocument,
    pub distance: f32,
}

struct CollectionState {
    documents: Vec<EmbeddableDocument>,
    index: VectorIndex,
}

struct Writer {
    file: File,
    next_seq: u64,
    /// Length of the log up to the last fully published entry.
    committed_len: u64,
    /// Set while an append is in flight; still set if that append was abandoned.
    pending: bool,
}

/// A named, persisted, append-only set of embedded documents.
///
/// Appends are serialized by the writer lock, which is held from the write
/// through publication so sequence numbers, log order and index ids agree.
/// Searches only take the state read lock.
pub struct Collection {
    name: CollectionName,
    log_path: PathBuf,
    state: RwLock<CollectionState>,
    writer: Mutex<Writer>,
}

impl Collection {
    /// Open the collection under `root`, creating it if needed.
    ///
    /// Existing entries are loaded, never discarded, apart from an
    /// unterminated trailing line.
    pub async fn open(
        root: &Path,
        name: CollectionName,
        model: &str,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let dir = root.join(name.as_str());
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;

        let expected = CollectionManifest {
            name,
            model: model.to_string(),
            dimension,
            metric,
            created_at: Utc::now(),
        };
        load_or_create_manifest(&dir.join(MANIFEST_FILE), &expected).await?;

        let log_path = dir.join(LOG_FILE);
        let (documents, index, committed_len) = load_log(&log_path, dimension, metric).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
            .map_err(|source| StorageError::WriteFile {
                path: log_path.clone(),
                source,
            })?;

        info!(
            "Opened collection {name} with {} documents ({dimension} dims, {metric})",
            documents.len()
        );

        let next_seq = documents.len() as u64;
        Ok(Self {
            name,
            log_path,
            state: RwLock::new(CollectionState { documents, index }),
            writer: Mutex::new(Writer {
                file,
                next_seq,
                committed_len,
                pending: false,
            }),
        })
    }

    pub fn name(&self) -> CollectionName {
        self.name
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Durably append a document and its embedding, returning its sequence number.
    ///
    /// `cancel` is honored only while waiting for the writer lock.
    pub async fn append(
        &self,
        document: EmbeddableDocument,
        embedding: Embedding,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut writer = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetrievalError::Cancelled),
            writer = self.writer.lock() => writer,
        };

        if writer.pending {
            // A previous append was dropped mid-write; cut its partial line.
            warn!("Discarding unfinished append in collection {}", self.name);
            let len = writer.committed_len;
            writer
                .file
                .set_len(len)
                .await
                .map_err(|source| self.write_error(source))?;
            writer.pending = false;
        }

        let seq = writer.next_seq;
        let entry = StoredEntry {
            seq,
            content: document.content,
            metadata: document.metadata,
            embedding,
        };
        let mut line = serde_json::to_string(&entry).map_err(StorageError::from)?;
        line.push('\n');

        writer.pending = true;
        writer
            .file
            .write_all(line.as_bytes())
            .await
            .map_err(|source| self.write_error(source))?;
        writer
            .file
            .flush()
            .await
            .map_err(|source| self.write_error(source))?;
        writer
            .file
            .sync_data()
            .await
            .map_err(|source| self.write_error(source))?;

        {
            let mut state = self.state.write().await;
            state
                .index
                .add(seq, entry.embedding)
                .map_err(|e| self.incompatible(e))?;
            state.documents.push(EmbeddableDocument {
                content: entry.content,
                metadata: entry.metadata,
            });
        }

        writer.committed_len += line.len() as u64;
        writer.next_seq += 1;
        writer.pending = false;

        debug!("Appended document {seq} to collection {}", self.name);
        Ok(seq)
    }

    /// Up to `k` stored documents nearest to `query`, closest first.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        let state = self.state.read().await;
        let neighbors = state
            .index
            .search(query, k)
            .map_err(|e| self.incompatible(e))?;

        let mut hits = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let document = state
                .documents
                .get(neighbor.id as usize)
                .ok_or_else(|| StorageError::Incompatible {
                    name: self.name.to_string(),
                    reason: format!("index refers to missing document {}", neighbor.id),
                })?;
            hits.push(Hit {
                seq: neighbor.id,
                document: document.clone(),
                distance: neighbor.distance,
            });
        }
        Ok(hits)
    }

    /// Swap the log handle for a read-only one so the next write fails.
    #[cfg(test)]
    pub(crate) async fn make_log_read_only(&self) -> std::io::Result<()> {
        let file = File::open(&self.log_path).await?;
        self.writer.lock().await.file = file;
        Ok(())
    }

    fn write_error(&self, source: std::io::Error) -> RetrievalError {
        StorageError::WriteFile {
            path: self.log_path.clone(),
            source,
        }
        .into()
    }

    fn incompatible(&self, err: EmbeddingError) -> RetrievalError {
        StorageError::Incompatible {
            name: self.name.to_string(),
            reason: err.to_string(),
        }
        .into()
    }
}

async fn load_or_create_manifest(path: &Path, expected: &CollectionManifest) -> Result<()> {
    match fs::read_to_string(path).await {
        Ok(text) => {
            let stored: CollectionManifest =
                serde_json::from_str(&text).map_err(|e| StorageError::Corrupt {
                    path: path.to_path_buf(),
                    line: 1,
                    reason: e.to_string(),
                })?;
            stored.check_compatible(expected)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let content = serde_json::to_string_pretty(expected).map_err(StorageError::from)?;

            // Write atomically using a temp file
            let temp_path = path.with_extension("json.tmp");
            fs::write(&temp_path, &content)
                .await
                .map_err(|source| StorageError::WriteFile {
                    path: temp_path.clone(),
                    source,
                })?;
            fs::rename(&temp_path, path)
                .await
                .map_err(|source| StorageError::WriteFile {
                    path: path.to_path_buf(),
                    source,
                })?;

            debug!("Created manifest {}", path.display());
            Ok(())
        }
        Err(source) => Err(StorageError::ReadFile {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}

/// Read the log, repairing a torn tail. Returns the documents, their index and
/// the byte length of the intact prefix.
async fn load_log(
    path: &Path,
    dimension: usize,
    metric: DistanceMetric,
) -> Result<(Vec<EmbeddableDocument>, VectorIndex, u64)> {
    let mut documents = Vec::new();
    let mut index = VectorIndex::new(dimension, metric);

    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((documents, index, 0));
        }
        Err(source) => {
            return Err(StorageError::ReadFile {
                path: path.to_path_buf(),
                source,
            }
            .into());
        }
    };

    let intact_len = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |pos| pos + 1);
    if intact_len < bytes.len() {
        warn!(
            "Dropping {} bytes of unterminated entry from {}",
            bytes.len() - intact_len,
            path.display()
        );
        truncate(path, intact_len as u64).await?;
    }

    let corrupt = |line: usize, reason: String| StorageError::Corrupt {
        path: path.to_path_buf(),
        line,
        reason,
    };

    for (line_no, line) in bytes[..intact_len].split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let entry: StoredEntry =
            serde_json::from_slice(line).map_err(|e| corrupt(line_no + 1, e.to_string()))?;

        let expected_seq = documents.len() as u64;
        if entry.seq != expected_seq {
            return Err(corrupt(
                line_no + 1,
                format!("expected sequence {expected_seq}, found {}", entry.seq),
            )
            .into());
        }

        index
            .add(entry.seq, entry.embedding)
            .map_err(|e| corrupt(line_no + 1, e.to_string()))?;
        documents.push(EmbeddableDocument {
            content: entry.content,
            metadata: entry.metadata,
        });
    }

    Ok((documents, index, intact_len as u64))
}

async fn truncate(path: &Path, len: u64) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|source| StorageError::WriteFile {
            path: path.to_path_buf(),
            source,
        })?;
    file.set_len(len)
        .await
        .map_err(|source| StorageError::WriteFile {
            path: path.to_path_buf(),
            source,
        })?;
    file.sync_all()
        .await
        .map_err(|source| StorageError::WriteFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use talentmatch_documents::MetadataValue;
    use tempfile::TempDir;

    fn doc(content: &str) -> EmbeddableDocument {
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), MetadataValue::from("job"));
        EmbeddableDocument {
            content: content.to_string(),
            metadata,
        }
    }

    async fn open(root: &Path) -> Collection {
        Collection::open(root, CollectionName::Jobs, "test-model", 2, DistanceMetric::Cosine)
            .await
            .unwrap()
    }

    async fn append(collection: &Collection, content: &str, embedding: Embedding) -> u64 {
        collection
            .append(doc(content), embedding, &CancellationToken::new())
            .await
            .unwrap()
    }

    #[test]
    fn test_collection_names() {
        assert_eq!("resumes".parse::<CollectionName>().unwrap(), CollectionName::Resumes);
        assert_eq!(CollectionName::Jobs.kind(), DocumentKind::Job);
        assert!(matches!(
            "students".parse::<CollectionName>(),
            Err(RetrievalError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_append_and_search() {
        let temp_dir = TempDir::new().unwrap();
        let collection = open(temp_dir.path()).await;

        assert!(collection.is_empty().await);
        assert_eq!(append(&collection, "east", vec![1.0, 0.0]).await, 0);
        assert_eq!(append(&collection, "north", vec![0.0, 1.0]).await, 1);

        let hits = collection.search(&[0.9, 0.1], 5).await.unwrap();
        let contents: Vec<&str> = hits.iter().map(|h| h.document.content.as_str()).collect();
        assert_eq!(contents, vec!["east", "north"]);
        assert_eq!(hits[0].seq, 0);
    }

    #[tokio::test]
    async fn test_cancelled_append_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let collection = open(temp_dir.path()).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = collection.append(doc("east"), vec![1.0, 0.0], &cancel).await;

        assert!(matches!(result, Err(RetrievalError::Cancelled)));
        assert!(collection.is_empty().await);
        assert_eq!(append(&collection, "north", vec![0.0, 1.0]).await, 0);
    }

    #[tokio::test]
    async fn test_reopen_restores_entries() {
        let temp_dir = TempDir::new().unwrap();
        {
            let collection = open(temp_dir.path()).await;
            append(&collection, "east", vec![1.0, 0.0]).await;
            append(&collection, "north", vec![0.0, 1.0]).await;
        }

        let collection = open(temp_dir.path()).await;
        assert_eq!(collection.len().await, 2);
        assert_eq!(append(&collection, "west", vec![-1.0, 0.0]).await, 2);

        let hits = collection.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].document.content, "north");
        assert_eq!(hits[0].document.metadata, doc("north").metadata);
    }

    #[tokio::test]
    async fn test_torn_tail_is_dropped_and_truncated() {
        let temp_dir = TempDir::new().unwrap();
        {
            let collection = open(temp_dir.path()).await;
            append(&collection, "east", vec![1.0, 0.0]).await;
        }

        let log = temp_dir.path().join("jobs").join(LOG_FILE);
        let intact = std::fs::read(&log).unwrap();
        let mut torn = intact.clone();
        torn.extend_from_slice(br#"{"seq":1,"content":"nor"#);
        std::fs::write(&log, &torn).unwrap();

        let collection = open(temp_dir.path()).await;
        assert_eq!(collection.len().await, 1);
        assert_eq!(std::fs::read(&log).unwrap(), intact);

        append(&collection, "north", vec![0.0, 1.0]).await;
        drop(collection);
        assert_eq!(open(temp_dir.path()).await.len().await, 2);
    }

    #[tokio::test]
    async fn test_unfinished_append_is_cut_before_the_next_one() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("jobs").join(LOG_FILE);
        {
            let collection = open(temp_dir.path()).await;
            append(&collection, "east", vec![1.0, 0.0]).await;
            let intact = std::fs::read(&log).unwrap();

            {
                let mut writer = collection.writer.lock().await;
                writer.pending = true;
                writer
                    .file
                    .write_all(br#"{"seq":1,"content":"nor"#)
                    .await
                    .unwrap();
                writer.file.flush().await.unwrap();
            }
            assert!(std::fs::read(&log).unwrap().len() > intact.len());

            assert_eq!(append(&collection, "west", vec![-1.0, 0.0]).await, 1);
            assert!(std::fs::read(&log).unwrap().starts_with(&intact));
        }

        let collection = open(temp_dir.path()).await;
        assert_eq!(collection.len().await, 2);
        let contents: Vec<String> = collection
            .search(&[0.0, 1.0], 5)
            .await
            .unwrap()
            .into_iter()
            .map(|hit| hit.document.content)
            .collect();
        assert_eq!(contents.len(), 2);
        assert!(contents.contains(&"east".to_string()));
        assert!(contents.contains(&"west".to_string()));

        let log_text = std::fs::read_to_string(&log).unwrap();
        assert_eq!(log_text.lines().count(), 2);
        assert!(!log_text.contains(r#""content":"nor""#));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_collection_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        {
            let collection = open(temp_dir.path()).await;
            append(&collection, "east", vec![1.0, 0.0]).await;
            collection.make_log_read_only().await.unwrap();

            let result = collection
                .append(doc("north"), vec![0.0, 1.0], &CancellationToken::new())
                .await;
            assert!(matches!(
                result,
                Err(RetrievalError::Storage(StorageError::WriteFile { .. }))
            ));
            assert_eq!(collection.len().await, 1);
            assert_eq!(collection.search(&[0.0, 1.0], 5).await.unwrap().len(), 1);
        }

        let collection = open(temp_dir.path()).await;
        assert_eq!(collection.len().await, 1);
        assert_eq!(append(&collection, "north", vec![0.0, 1.0]).await, 1);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_a_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        {
            let collection = open(temp_dir.path()).await;
            append(&collection, "east", vec![1.0, 0.0]).await;
        }

        let log = temp_dir.path().join("jobs").join(LOG_FILE);
        let mut bytes = b"THIS IS NOT JSON\n".to_vec();
        bytes.extend(std::fs::read(&log).unwrap());
        std::fs::write(&log, bytes).unwrap();

        let err = Collection::open(
            temp_dir.path(),
            CollectionName::Jobs,
            "test-model",
            2,
            DistanceMetric::Cosine,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(
            err,
            RetrievalError::Storage(StorageError::Corrupt { line: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_manifest_pins_metric_and_dimension() {
        let temp_dir = TempDir::new().unwrap();
        drop(open(temp_dir.path()).await);

        let wrong_metric = Collection::open(
            temp_dir.path(),
            CollectionName::Jobs,
            "test-model",
            2,
            DistanceMetric::L2,
        )
        .await;
        assert!(matches!(
            wrong_metric,
            Err(RetrievalError::Storage(StorageError::Incompatible { .. }))
        ));

        let wrong_dimension = Collection::open(
            temp_dir.path(),
            CollectionName::Jobs,
            "test-model",
            3,
            DistanceMetric::Cosine,
        )
        .await;
        assert!(matches!(
            wrong_dimension,
            Err(RetrievalError::Storage(StorageError::Incompatible { .. }))
        ));
    }
}
