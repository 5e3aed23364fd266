//! Dual-collection retrieval engine.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use talentmatch_documents::{
    EmbeddableDocument, JobRecord, ResumeRecord, StructuredRecord, build, build_job, build_resume,
};
use talentmatch_embeddings::{
    DistanceMetric, Embedding, EmbeddingError, EmbeddingProvider, EmbeddingRequest,
};

use crate::collection::{Collection, CollectionName};
use crate::config::{EngineConfig, PreviewConfig};
use crate::error::{Result, RetrievalError};
use crate::matches::{JobMatch, MatchResult, ResumeMatch};

const SAMPLE_TEXT: &str = "embedding sample";

/// Semantic search over the `resumes` and `jobs` collections.
///
/// The engine is `Send + Sync`; share it behind an `Arc`. Indexing into one
/// collection is serialized, searches run concurrently with everything.
pub struct RetrievalEngine {
    provider: Arc<dyn EmbeddingProvider>,

    /// Width of every vector the provider emits.
    dimension: usize,

    config: EngineConfig,

    resumes: Collection,
    jobs: Collection,
}

impl RetrievalEngine {
    /// Create a new engine builder.
    pub fn builder() -> RetrievalEngineBuilder {
        RetrievalEngineBuilder::new()
    }

    /// Open the engine using the provider described by `config.embedding`.
    pub async fn open(config: EngineConfig) -> Result<Self> {
        let provider = config.embedding.build_provider().await?;
        Self::with_provider(config, provider).await
    }

    /// Open the engine with an explicit provider.
    ///
    /// The provider embeds a sample text once; if it cannot embed, or emits
    /// vectors of a width other than the configured one, construction fails with
    /// [`RetrievalError::EmbeddingUnavailable`].
    pub async fn with_provider(
        config: EngineConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        info!(
            "Opening retrieval engine at {} with {} provider",
            config.root.display(),
            provider.name()
        );

        if !provider.is_available() {
            return Err(EmbeddingError::ProviderNotConfigured(format!(
                "{} provider is not available",
                provider.name()
            ))
            .into());
        }

        let sample = provider.embed(EmbeddingRequest::new(SAMPLE_TEXT)).await?;
        let dimension = sample.embedding.len();
        if dimension == 0 {
            return Err(EmbeddingError::InvalidResponse(
                "provider returned an empty vector".to_string(),
            )
            .into());
        }
        if let Some(expected) = config.embedding.dimension {
            if expected != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: dimension,
                }
                .into());
            }
        }

        let model = provider.default_model().to_string();
        let resumes = Collection::open(
            &config.root,
            CollectionName::Resumes,
            &model,
            dimension,
            config.metric,
        )
        .await?;
        let jobs = Collection::open(
            &config.root,
            CollectionName::Jobs,
            &model,
            dimension,
            config.metric,
        )
        .await?;

        info!("Retrieval engine ready ({model}, {dimension} dims, {})", config.metric);

        Ok(Self {
            provider,
            dimension,
            config,
            resumes,
            jobs,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    /// Embed and durably append `document` to the named collection.
    pub async fn index(&self, collection: &str, document: EmbeddableDocument) -> Result<()> {
        self.index_with_cancel(collection, document, &CancellationToken::new())
            .await
    }

    /// Like [`index`](Self::index), abandoning the call if `cancel` fires
    /// before the append starts.
    pub async fn index_with_cancel(
        &self,
        collection: &str,
        document: EmbeddableDocument,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name: CollectionName = collection.parse()?;
        self.index_into(name, document, cancel).await
    }

    pub async fn index_resume(&self, resume: &ResumeRecord) -> Result<()> {
        self.index_into(
            CollectionName::Resumes,
            build_resume(resume),
            &CancellationToken::new(),
        )
        .await
    }

    pub async fn index_job(&self, job: &JobRecord) -> Result<()> {
        self.index_into(CollectionName::Jobs, build_job(job), &CancellationToken::new())
            .await
    }

    /// Index a record into the collection matching its kind.
    pub async fn index_record(&self, record: &StructuredRecord) -> Result<()> {
        let name = CollectionName::for_kind(record.kind());
        self.index_into(name, build(record), &CancellationToken::new())
            .await
    }

    /// Up to `k` documents from the named collection closest to `query`.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<MatchResult>> {
        self.search_with_cancel(collection, query, k, &CancellationToken::new())
            .await
    }

    pub async fn search_with_cancel(
        &self,
        collection: &str,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<MatchResult>> {
        let name: CollectionName = collection.parse()?;
        self.search_in(name, query, k, cancel).await
    }

    /// Resumes best matching a free-text query.
    pub async fn search_resumes(&self, query: &str, k: usize) -> Result<Vec<ResumeMatch>> {
        let results = self
            .search_in(CollectionName::Resumes, query, k, &CancellationToken::new())
            .await?;
        Ok(results.into_iter().filter_map(MatchResult::into_resume).collect())
    }

    /// Jobs best matching a free-text query (typically a candidate profile).
    pub async fn match_jobs(&self, query: &str, k: usize) -> Result<Vec<JobMatch>> {
        let results = self
            .search_in(CollectionName::Jobs, query, k, &CancellationToken::new())
            .await?;
        Ok(results.into_iter().filter_map(MatchResult::into_job).collect())
    }

    /// Number of documents in the named collection.
    pub async fn len(&self, collection: &str) -> Result<usize> {
        let name: CollectionName = collection.parse()?;
        Ok(self.collection(name).len().await)
    }

    /// Get engine statistics.
    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            root: self.config.root.clone(),
            provider: self.provider.name().to_string(),
            model: self.provider.default_model().to_string(),
            dimension: self.dimension,
            metric: self.config.metric,
            resumes: self.resumes.len().await,
            jobs: self.jobs.len().await,
        }
    }

    async fn index_into(
        &self,
        name: CollectionName,
        document: EmbeddableDocument,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match document.kind() {
            Some(kind) if kind == name.kind() => {}
            Some(kind) => {
                return Err(RetrievalError::InvalidArgument(format!(
                    "{kind} document cannot be indexed into {name}"
                )));
            }
            None => {
                return Err(RetrievalError::InvalidArgument(
                    "document metadata has no recognized type".to_string(),
                ));
            }
        }

        let embedding = self.embed(&document.content, cancel).await?;

        let seq = self
            .collection(name)
            .append(document, embedding, cancel)
            .await?;
        debug!("Indexed document {seq} into {name}");
        Ok(())
    }

    async fn search_in(
        &self,
        name: CollectionName,
        query: &str,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<MatchResult>> {
        if k == 0 {
            return Err(RetrievalError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }

        let embedding = self.embed(query, cancel).await?;
        let hits = self.collection(name).search(&embedding, k).await?;

        let preview_chars = self.preview_chars(name);
        let results: Vec<MatchResult> = hits
            .iter()
            .map(|hit| {
                MatchResult::from_document(name.kind(), &hit.document, hit.distance, preview_chars)
            })
            .collect();

        debug!("Search in {name} returned {} of k={k}", results.len());
        Ok(results)
    }

    async fn embed(&self, text: &str, cancel: &CancellationToken) -> Result<Embedding> {
        let response = cancellable(cancel, async {
            self.provider
                .embed(EmbeddingRequest::new(text))
                .await
                .map_err(RetrievalError::from)
        })
        .await?;

        if response.embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: response.embedding.len(),
            }
            .into());
        }
        Ok(response.embedding)
    }

    fn collection(&self, name: CollectionName) -> &Collection {
        match name {
            CollectionName::Resumes => &self.resumes,
            CollectionName::Jobs => &self.jobs,
        }
    }

    fn preview_chars(&self, name: CollectionName) -> usize {
        let PreviewConfig {
            resume_chars,
            job_chars,
        } = self.config.preview;
        match name {
            CollectionName::Resumes => resume_chars,
            CollectionName::Jobs => job_chars,
        }
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RetrievalError::Cancelled),
        result = fut => result,
    }
}

/// Builder for [`RetrievalEngine`].
pub struct RetrievalEngineBuilder {
    config: EngineConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl RetrievalEngineBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            provider: None,
        }
    }

    /// Start from an existing configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the directory holding the collections.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.metric = metric;
        self
    }

    /// Use `provider` instead of the one described by the configuration.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Build the engine.
    pub async fn build(self) -> Result<RetrievalEngine> {
        match self.provider {
            Some(provider) => RetrievalEngine::with_provider(self.config, provider).await,
            None => RetrievalEngine::open(self.config).await,
        }
    }
}

impl Default for RetrievalEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the retrieval engine.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub root: PathBuf,
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub metric: DistanceMetric,

    /// Documents in the `resumes` collection.
    pub resumes: usize,

    /// Documents in the `jobs` collection.
    pub jobs: usize,
}
