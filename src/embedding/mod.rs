mod batch;
mod hashing;
mod hnsw;
/// Embedding & Indexing
///
/// This module turns text into unit-norm vectors and answers nearest-neighbor queries
/// over them.
/// Architecture:
/// - Embedder trait for abstraction (encode() always returns L2-normalized vectors)
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - HashingEmbedder for offline, download-free operation
/// - VectorIndex trait with an exact flat index (default) and HNSW (approximate)
/// - Batch encoding for corpus builds
mod provider;
mod vector_index;

pub use batch::{BatchEncoder, EncodeStats};
pub use hashing::{HashingEmbedder, WordTokenizer};
pub use hnsw::HnswIndex;
pub use provider::{embedder_for_model, Embedder, EmbeddingError, FastEmbedProvider};
pub use vector_index::{
    new_index, FlatIndex, IndexKind, IndexOptions, SearchHit, VectorIndex, VectorIndexError,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an embedding space: the model that produced the vectors and their width
///
/// An index built under one binding can only be queried with vectors from the same
/// binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelBinding {
    pub model: String,
    pub dimension: usize,
}

impl ModelBinding {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
        }
    }
}

impl fmt::Display for ModelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}D)", self.model, self.dimension)
    }
}

/// In-place L2 normalization.
///
/// Returns `false`, leaving the vector untouched, when the norm is zero or not finite.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm_sq: f32 = v.iter().map(|x| x * x).sum();
    if norm_sq <= 0.0 || !norm_sq.is_finite() {
        return false;
    }
    let inv_norm = norm_sq.sqrt().recip();
    for x in v.iter_mut() {
        *x *= inv_norm;
    }
    true
}
