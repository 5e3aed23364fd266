//! Configuration for the retrieval engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use talentmatch_embeddings::{
    DEFAULT_DIMENSION, DistanceMetric, EmbeddingProvider, HashingProvider, OpenAIProvider,
    SentenceTransformerProvider,
};

use crate::error::{Result, RetrievalError};

/// Configuration for the retrieval engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the `resumes` and `jobs` collections.
    pub root: PathBuf,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Distance metric, recorded in every collection manifest.
    pub metric: DistanceMetric,

    /// Preview lengths for match results.
    pub preview: PreviewConfig,
}

impl EngineConfig {
    /// Create a configuration rooted at `root` with default values.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            embedding: EmbeddingConfig::default(),
            metric: DistanceMetric::default(),
            preview: PreviewConfig::default(),
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| RetrievalError::Config(e.to_string()))
    }

    /// Load a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Set the embedding configuration.
    pub fn with_embedding(mut self, config: EmbeddingConfig) -> Self {
        self.embedding = config;
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the preview configuration.
    pub fn with_preview(mut self, preview: PreviewConfig) -> Self {
        self.preview = preview;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(
            dirs::data_dir()
                .unwrap_or_default()
                .join("talentmatch/vectordb"),
        )
    }
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to request (provider default when unset). For the
    /// sentence-transformer provider this is a hub model id.
    pub model: Option<String>,

    /// Directory with local sentence-transformer files; skips the hub.
    pub model_dir: Option<PathBuf>,

    /// Vector width. Required to match what the provider emits.
    pub dimension: Option<usize>,

    /// Base URL for HTTP providers.
    pub base_url: Option<String>,

    /// API key for HTTP providers; `OPENAI_API_KEY` is used when unset.
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Hashing,
            model: None,
            model_dir: None,
            dimension: None,
            base_url: None,
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    /// Construct the configured provider.
    ///
    /// Loading a sentence-transformer reads (and on first use downloads) the
    /// model weights.
    pub async fn build_provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let provider: Arc<dyn EmbeddingProvider> = match self.provider {
            EmbeddingProviderType::Hashing => Arc::new(HashingProvider::new(
                self.dimension.unwrap_or(DEFAULT_DIMENSION),
            )),
            EmbeddingProviderType::SentenceTransformer => {
                let provider = match &self.model_dir {
                    Some(dir) => SentenceTransformerProvider::load_from_dir(dir).await?,
                    None => {
                        let model = self
                            .model
                            .as_deref()
                            .unwrap_or(SentenceTransformerProvider::DEFAULT_MODEL);
                        SentenceTransformerProvider::load(model).await?
                    }
                };
                Arc::new(provider)
            }
            EmbeddingProviderType::OpenAI => {
                let mut provider = match &self.api_key {
                    Some(key) => OpenAIProvider::new().with_api_key(key.clone()),
                    None => OpenAIProvider::from_env(),
                };
                if let Some(url) = &self.base_url {
                    provider = provider.with_base_url(url.clone());
                }
                if let Some(model) = &self.model {
                    provider = provider.with_model(model.clone());
                }
                if let Some(dimension) = self.dimension {
                    provider = provider.with_dimensions(dimension);
                }
                Arc::new(provider)
            }
        };
        Ok(provider)
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// Local feature hashing.
    Hashing,
    /// Local BERT-family encoder, `all-MiniLM-L6-v2` unless `model` is set.
    SentenceTransformer,
    /// OpenAI-compatible embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
}

/// How much stored content each match carries as its preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub resume_chars: usize,
    pub job_chars: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            resume_chars: 200,
            job_chars: 300,
        }
    }
}
