//! Embedding providers.
//!
//! Two providers ship with the crate: a deterministic local hashing provider
//! and a client for OpenAI-compatible embedding endpoints.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;
use crate::{DEFAULT_DIMENSION, Embedding};

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Model to use (provider-specific).
    pub model: Option<String>,
}

impl EmbeddingRequest {
    /// Create a new embedding request.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,

    /// Token usage (if available).
    pub tokens_used: Option<u64>,
}

/// Trait for embedding providers.
///
/// Implementations must be deterministic for a fixed model and input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the default embedding dimension.
    fn default_dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Generate embeddings for multiple texts.
    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.embed(request).await?);
        }
        Ok(results)
    }

    /// Check if the provider is usable (API key set, non-zero width, etc.).
    fn is_available(&self) -> bool;
}

/// Local feature-hashing provider.
///
/// Text is lowercased and split into alphanumeric tokens. Each distinct token
/// lands in one signed bucket chosen by its SHA-256 digest and contributes
/// `1 + ln(tf)`. The result is L2-normalized. Vectors depend only on the text
/// and the dimension, so they stay valid across restarts.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    pub const MODEL: &'static str = "feature-hashing-v1";

    /// Create a provider emitting vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Embedding {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokenize(text) {
            *counts.entry(token).or_default() += 1;
        }

        let mut embedding = vec![0.0f32; self.dimension];
        for (token, tf) in &counts {
            let (bucket, sign) = self.bucket(token);
            embedding[bucket] += sign * (1.0 + (*tf as f32).ln());
        }

        normalize(&mut embedding);
        embedding
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(word) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl Default for HashingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn name(&self) -> &str {
        "hashing"
    }

    fn default_model(&self) -> &str {
        Self::MODEL
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        if self.dimension == 0 {
            return Err(EmbeddingError::ProviderNotConfigured(
                "hashing provider needs a non-zero dimension".to_string(),
            ));
        }

        let embedding = self.embed_text(&request.text);
        Ok(EmbeddingResponse {
            dimension: embedding.len(),
            embedding,
            model: Self::MODEL.to_string(),
            tokens_used: Some(tokenize(&request.text).count() as u64),
        })
    }

    fn is_available(&self) -> bool {
        self.dimension > 0
    }
}

/// OpenAI-compatible embedding provider.
///
/// Works against the OpenAI API or any server exposing the same
/// `/embeddings` route.
pub struct OpenAIProvider {
    api_key: Option<String>,

    /// Root the `/embeddings` route hangs off, without a trailing slash.
    base_url: String,

    client: reqwest::Client,
    default_model: String,

    /// Requested output width, for models that support shortening.
    dimensions: Option<usize>,
}

impl OpenAIProvider {
    /// Create a provider without credentials.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            default_model: "text-embedding-3-small".to_string(),
            dimensions: None,
        }
    }

    /// Create a provider reading the key from `OPENAI_API_KEY`.
    pub fn from_env() -> Self {
        let mut provider = Self::new();
        provider.api_key = std::env::var("OPENAI_API_KEY").ok();
        provider
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Ask the endpoint for vectors of `dimensions` components.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    async fn post(&self, input: serde_json::Value, model: &str) -> Result<OpenAIEmbeddingResponse> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EmbeddingError::ProviderNotConfigured("no API key for OpenAI provider".to_string())
        })?;

        let mut body = serde_json::json!({
            "input": input,
            "model": model
        });
        if let Some(dims) = self.dimensions {
            body["dimensions"] = serde_json::json!(dims);
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "API error ({status}): {error_text}"
            )));
        }

        Ok(response.json().await?)
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn default_dimension(&self) -> usize {
        if let Some(dims) = self.dimensions {
            return dims;
        }
        match self.default_model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = request
            .model
            .unwrap_or_else(|| self.default_model.clone());

        debug!("Embedding {} chars with {model}", request.text.len());

        let result = self.post(serde_json::json!(request.text), &model).await?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))?
            .embedding;

        let dimension = embedding.len();
        let tokens_used = result.usage.map(|u| u.total_tokens);

        debug!("Received {dimension}-dimensional vector from {}", result.model);

        Ok(EmbeddingResponse {
            embedding,
            model: result.model,
            dimension,
            tokens_used,
        })
    }

    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        let Some(first) = requests.first() else {
            return Ok(Vec::new());
        };

        let model = first
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let texts: Vec<&str> = requests.iter().map(|r| r.text.as_str()).collect();

        debug!("Embedding batch of {} texts with {model}", texts.len());

        let mut result = self.post(serde_json::json!(texts), &model).await?;
        if result.data.len() != requests.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                requests.len(),
                result.data.len()
            )));
        }
        result.data.sort_by_key(|item| item.index);

        let responses: Vec<EmbeddingResponse> = result
            .data
            .into_iter()
            .map(|item| EmbeddingResponse {
                dimension: item.embedding.len(),
                embedding: item.embedding,
                model: result.model.clone(),
                tokens_used: None,
            })
            .collect();

        info!("Embedded batch of {} texts", responses.len());

        Ok(responses)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Body of a successful `/embeddings` call.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    model: String,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_embedding_request() {
        let request = EmbeddingRequest::new("Hello world").with_model("text-embedding-3-small");

        assert_eq!(request.text, "Hello world");
        assert_eq!(request.model, Some("text-embedding-3-small".to_string()));
    }

    #[test]
    fn test_openai_provider_default_dimensions() {
        let provider = OpenAIProvider::new().with_model("text-embedding-3-large");
        assert_eq!(provider.default_dimension(), 3072);
        assert_eq!(provider.with_dimensions(256).default_dimension(), 256);
    }

    #[test]
    fn test_openai_provider_needs_key() {
        assert!(!OpenAIProvider::new().is_available());
        assert!(OpenAIProvider::new().with_api_key("k").is_available());
    }

    #[tokio::test]
    async fn test_hashing_is_deterministic() {
        let provider = HashingProvider::new(64);
        let a = provider.embed(EmbeddingRequest::new("Python, SQL")).await.unwrap();
        let b = provider.embed(EmbeddingRequest::new("python sql")).await.unwrap();

        assert_eq!(a.dimension, 64);
        assert_eq!(a.embedding, b.embedding);
    }

    #[tokio::test]
    async fn test_hashing_prefers_shared_vocabulary() {
        let provider = HashingProvider::default();
        let query = provider
            .embed(EmbeddingRequest::new("rust backend engineer"))
            .await
            .unwrap();
        let close = provider
            .embed(EmbeddingRequest::new("senior rust backend engineer"))
            .await
            .unwrap();
        let far = provider
            .embed(EmbeddingRequest::new("pastry chef croissants"))
            .await
            .unwrap();

        let near_score = cosine_similarity(&query.embedding, &close.embedding).unwrap();
        let far_score = cosine_similarity(&query.embedding, &far.embedding).unwrap();
        assert!(near_score > 0.7, "near score was {near_score}");
        assert!(near_score > far_score);
    }

    #[tokio::test]
    async fn test_hashing_output_is_unit_length() {
        let provider = HashingProvider::new(32);
        let response = provider
            .embed(EmbeddingRequest::new("a b c a"))
            .await
            .unwrap();
        let norm: f32 = response.embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_zero_width_hashing_is_unavailable() {
        let provider = HashingProvider::new(0);
        assert!(!provider.is_available());
        assert!(matches!(
            provider.embed(EmbeddingRequest::new("x")).await,
            Err(EmbeddingError::ProviderNotConfigured(_))
        ));
    }
}
