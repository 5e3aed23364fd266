//! Local sentence-transformer embeddings.
//!
//! A BERT-family encoder from the Hugging Face hub runs on the CPU through
//! candle. Token states are mean-pooled under the attention mask and
//! L2-normalized, which reproduces the `sentence-transformers` output for
//! models such as `all-MiniLM-L6-v2`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
use crate::similarity::normalize;

/// Longest input, in tokens, the encoder sees. Longer texts are truncated.
const MAX_TOKENS: usize = 256;

/// Provider backed by a locally executed sentence-transformer.
///
/// Model files are fetched into the Hugging Face cache on first use, so
/// [`SentenceTransformerProvider::load`] needs network access once per model.
pub struct SentenceTransformerProvider {
    model_id: String,
    dimension: usize,
    encoder: Arc<Encoder>,
}

impl SentenceTransformerProvider {
    pub const DEFAULT_MODEL: &'static str = "sentence-transformers/all-MiniLM-L6-v2";

    /// Download (or reuse from the cache) and load `model_id`.
    pub async fn load(model_id: impl Into<String>) -> Result<Self> {
        let model_id = model_id.into();
        let repo_id = model_id.clone();
        let encoder = tokio::task::spawn_blocking(move || Encoder::from_hub(&repo_id))
            .await
            .map_err(model_error)??;
        Ok(Self::with_encoder(model_id, encoder))
    }

    /// Load a model from a directory holding `config.json`, `tokenizer.json`
    /// and `model.safetensors`.
    pub async fn load_from_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let model_id = dir.display().to_string();
        let encoder = tokio::task::spawn_blocking(move || {
            Encoder::from_files(
                dir.join("config.json"),
                dir.join("tokenizer.json"),
                dir.join("model.safetensors"),
            )
        })
        .await
        .map_err(model_error)??;
        Ok(Self::with_encoder(model_id, encoder))
    }

    fn with_encoder(model_id: String, encoder: Encoder) -> Self {
        let dimension = encoder.hidden_size;
        info!("Loaded sentence-transformer {model_id} ({dimension} dims)");
        Self {
            model_id,
            dimension,
            encoder: Arc::new(encoder),
        }
    }
}

impl fmt::Debug for SentenceTransformerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentenceTransformerProvider")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EmbeddingProvider for SentenceTransformerProvider {
    fn name(&self) -> &str {
        "sentence_transformer"
    }

    fn default_model(&self) -> &str {
        &self.model_id
    }

    fn default_dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        self.embed_batch(vec![request])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = requests.into_iter().map(|request| request.text).collect();
        let count = texts.len();
        let encoder = Arc::clone(&self.encoder);
        let vectors = tokio::task::spawn_blocking(move || encoder.encode(&texts))
            .await
            .map_err(model_error)??;
        debug!("Encoded {count} texts with {}", self.model_id);

        Ok(vectors
            .into_iter()
            .map(|embedding| EmbeddingResponse {
                dimension: embedding.len(),
                embedding,
                model: self.model_id.clone(),
                tokens_used: None,
            })
            .collect())
    }

    fn is_available(&self) -> bool {
        self.dimension > 0
    }
}

struct Encoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
}

impl Encoder {
    fn from_hub(model_id: &str) -> Result<Self> {
        let api = Api::new().map_err(model_error)?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));
        let config = repo.get("config.json").map_err(model_error)?;
        let tokenizer = repo.get("tokenizer.json").map_err(model_error)?;
        let weights = repo.get("model.safetensors").map_err(model_error)?;
        Self::from_files(config, tokenizer, weights)
    }

    fn from_files(config: PathBuf, tokenizer: PathBuf, weights: PathBuf) -> Result<Self> {
        let device = Device::Cpu;

        let config = std::fs::read_to_string(&config).map_err(model_error)?;
        let config: Config = serde_json::from_str(&config)?;
        let hidden_size = config.hidden_size;

        let mut tokenizer = Tokenizer::from_file(&tokenizer).map_err(model_error)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(model_error)?;

        // SAFETY: the weights file lives in the model cache and is not
        // rewritten while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device,
            hidden_size,
        })
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(model_error)?;

        let batch = encodings.len();
        let width = encodings
            .iter()
            .map(|encoding| encoding.get_ids().len())
            .max()
            .unwrap_or(0);
        let mut ids = vec![0u32; batch * width];
        let mut mask = vec![0u32; batch * width];
        for (row, encoding) in encodings.iter().enumerate() {
            let start = row * width;
            let len = encoding.get_ids().len();
            ids[start..start + len].copy_from_slice(encoding.get_ids());
            mask[start..start + len].copy_from_slice(encoding.get_attention_mask());
        }

        let ids = Tensor::from_vec(ids, (batch, width), &self.device)?;
        let mask = Tensor::from_vec(mask, (batch, width), &self.device)?;
        let token_type_ids = ids.zeros_like()?;

        let hidden = self.model.forward(&ids, &token_type_ids, Some(&mask))?;
        let mut vectors = mean_pool(&hidden, &mask)?.to_vec2::<f32>()?;
        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }
}

/// Average token states over the positions the attention mask keeps.
fn mean_pool(hidden: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = mask.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
    summed.broadcast_div(&counts)
}

fn model_error(err: impl fmt::Display) -> EmbeddingError {
    EmbeddingError::Model(err.to_string())
}
