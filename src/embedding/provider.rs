/// Embedder trait and FastEmbed implementation
use super::{l2_normalize, HashingEmbedder, ModelBinding};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding {index} has zero norm and cannot be normalized")]
    ZeroNorm { index: usize },
}

/// Trait for text encoders producing fixed-dimension vectors
///
/// Backends implement [`Embedder::embed_batch`]; callers use [`Embedder::encode`],
/// which validates the output and returns unit-norm vectors.
pub trait Embedder: Send + Sync {
    /// Raw embeddings for a batch of texts, one per input, in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Identity of the embedding space this encoder produces
    fn binding(&self) -> ModelBinding {
        ModelBinding::new(self.model_name(), self.dimension())
    }

    /// Encode texts into L2-normalized vectors.
    ///
    /// Blank texts are rejected, as is any output vector whose norm is zero.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(index) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(format!(
                "Text at position {} is empty",
                index
            )));
        }

        let mut embeddings = self.embed_batch(texts)?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }

        for (index, embedding) in embeddings.iter_mut().enumerate() {
            if embedding.len() != self.dimension() {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension(),
                    actual: embedding.len(),
                });
            }
            if !l2_normalize(embedding) {
                return Err(EmbeddingError::ZeroNorm { index });
            }
        }

        Ok(embeddings)
    }
}

/// Build the embedder named by `model_name`.
///
/// `hashing-<dim>` selects the offline [`HashingEmbedder`]; anything else is looked up
/// in the FastEmbed model table.
pub fn embedder_for_model(
    model_name: &str,
    batch_size: usize,
    cache_dir: Option<PathBuf>,
) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    if let Some(embedder) = HashingEmbedder::from_model_name(model_name)? {
        return Ok(Arc::new(embedder));
    }

    let provider = FastEmbedProvider::new(model_name, batch_size, cache_dir)?;
    Ok(Arc::new(provider))
}

/// FastEmbed provider for local embedding generation
///
/// Uses all-MiniLM-L6-v2 model (384 dimensions) by default.
/// Optimized for offline operation with no API calls.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
    batch_size: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// **Important**: Models are downloaded on-demand to the cache directory
    /// (defaults to `.fastembed_cache/`) on first use.
    /// - all-MiniLM-L6-v2: 90MB (384 dims) - recommended for most use cases
    /// - bge-small-en-v1.5: 130MB (384 dims) - better accuracy
    /// - bge-base-en-v1.5: 440MB (768 dims) - highest accuracy
    pub fn new(
        model_name: &str,
        batch_size: usize,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension, model_size_mb) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
                (EmbeddingModel::AllMiniLML6V2, 384, 90)
            }
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384, 130),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768, 440),
            _ => {
                return Err(EmbeddingError::InitializationError(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5, hashing-<dim>",
                    model_name
                )));
            }
        };

        tracing::info!(
            "Initializing embedding model: {} ({}D, ~{}MB download if not cached)",
            model_name,
            dimension,
            model_size_mb
        );

        let mut init_options =
            InitOptions::new(embedding_model).with_show_download_progress(true);
        if let Some(dir) = cache_dir {
            init_options = init_options.with_cache_dir(dir);
        }

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
            batch_size: batch_size.max(1),
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2", 32, None)
    }
}

impl Embedder for FastEmbedProvider {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
