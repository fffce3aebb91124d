/// Deterministic feature-hashing embedder for offline operation
use super::{Embedder, EmbeddingError};
use ahash::RandomState;
use regex::Regex;

/// Fixed seeds so that vectors are reproducible across processes
const HASH_SEEDS: (u64, u64, u64, u64) = (
    0x5349_4654_0000_0001,
    0x9e37_79b9_7f4a_7c15,
    0xc2b2_ae3d_27d4_eb4f,
    0x1656_67b1_9e37_79f9,
);

const MODEL_PREFIX: &str = "hashing-";

/// Splits text into lower-cased runs of letters and digits
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    pattern: Regex,
}

impl WordTokenizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"[\p{L}\p{N}]+")?,
        })
    }

    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
    }
}

/// Bag-of-words encoder hashing each token into one of `dimension` signed buckets
///
/// No model download; the vector space is fixed by the dimension alone.
pub struct HashingEmbedder {
    dimension: usize,
    model_name: String,
    hasher: RandomState,
    tokenizer: WordTokenizer,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InitializationError(
                "Hashing embedder dimension must be greater than 0".to_string(),
            ));
        }

        let tokenizer = WordTokenizer::new()
            .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

        let (k0, k1, k2, k3) = HASH_SEEDS;
        Ok(Self {
            dimension,
            model_name: format!("{}{}", MODEL_PREFIX, dimension),
            hasher: RandomState::with_seeds(k0, k1, k2, k3),
            tokenizer,
        })
    }

    /// Parse a `hashing-<dim>` model name; `Ok(None)` for any other name
    pub fn from_model_name(model_name: &str) -> Result<Option<Self>, EmbeddingError> {
        let Some(dim) = model_name.strip_prefix(MODEL_PREFIX) else {
            return Ok(None);
        };

        let dimension = dim.parse::<usize>().map_err(|_| {
            EmbeddingError::InitializationError(format!(
                "Invalid hashing model name '{}': expected hashing-<dimension>",
                model_name
            ))
        })?;

        Self::new(dimension).map(Some)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in self.tokenizer.tokens(text) {
            let hash = self.hasher.hash_one(token.as_str());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
