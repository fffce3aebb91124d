/// Vector index for inner-product similarity search
use super::HnswIndex;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },
}

/// Search hit: position of the vector in build order and its similarity score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Position of the vector in the sequence passed to `build`
    pub position: usize,
    /// Inner product with the query (cosine similarity for unit vectors, -1.0 to 1.0)
    pub score: f32,
}

/// Nearest-neighbor index over unit-norm vectors
///
/// Built once from the full corpus and read-only afterwards; searches take `&self`
/// so any number of readers can share one index.
pub trait VectorIndex: Send + Sync {
    /// Replace the index contents with `vectors`; position `i` is `vectors[i]`
    fn build(&mut self, vectors: &[Vec<f32>]) -> Result<(), VectorIndexError>;

    /// Up to `k` hits ordered by descending score, ties by ascending position.
    /// Returns `min(k, len())` hits with unique positions.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorIndexError>;

    /// Get the number of vectors in the index
    fn len(&self) -> usize;

    /// Check if index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    fn dimension(&self) -> usize;

    fn kind(&self) -> IndexKind;
}

/// Index implementation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact brute-force inner product
    #[default]
    Flat,
    /// Approximate HNSW graph
    Hnsw,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Flat => write!(f, "flat"),
            IndexKind::Hnsw => write!(f, "hnsw"),
        }
    }
}

impl FromStr for IndexKind {
    type Err = VectorIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(IndexKind::Flat),
            "hnsw" => Ok(IndexKind::Hnsw),
            other => Err(VectorIndexError::InitializationError(format!(
                "Unknown index kind '{}', expected 'flat' or 'hnsw'",
                other
            ))),
        }
    }
}

/// Index construction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexOptions {
    pub kind: IndexKind,
    /// HNSW M parameter (number of connections per layer)
    pub hnsw_m: usize,
    /// HNSW construction parameter (higher = better recall, slower build)
    pub hnsw_ef_construction: usize,
    /// HNSW search parameter (higher = better recall, slower search)
    pub hnsw_ef_search: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            kind: IndexKind::Flat,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
        }
    }
}

/// Create an empty index of the configured kind
pub fn new_index(dimension: usize, options: &IndexOptions) -> Box<dyn VectorIndex> {
    match options.kind {
        IndexKind::Flat => Box::new(FlatIndex::new(dimension)),
        IndexKind::Hnsw => Box::new(HnswIndex::new(
            dimension,
            options.hnsw_m,
            options.hnsw_ef_construction,
            options.hnsw_ef_search,
        )),
    }
}

/// Descending score, then ascending position
pub(crate) fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.position.cmp(&b.position))
}

/// Keep the best `k` hits in rank order
pub(crate) fn top_k(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    let k = k.min(hits.len());
    if k == 0 {
        return Vec::new();
    }
    if k < hits.len() {
        hits.select_nth_unstable_by(k - 1, compare_hits);
        hits.truncate(k);
    }
    hits.sort_by(compare_hits);
    hits
}

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<(), VectorIndexError> {
    if expected != actual {
        return Err(VectorIndexError::InvalidDimension { expected, actual });
    }
    Ok(())
}

/// Exact inner-product index
///
/// Vectors are stored as rows of one matrix; a search is a single matrix-vector product
/// followed by top-k selection.
pub struct FlatIndex {
    dimension: usize,
    matrix: Array2<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            matrix: Array2::zeros((0, dimension)),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn build(&mut self, vectors: &[Vec<f32>]) -> Result<(), VectorIndexError> {
        let mut data = Vec::with_capacity(vectors.len() * self.dimension);
        for vector in vectors {
            check_dimension(self.dimension, vector.len())?;
            data.extend_from_slice(vector);
        }

        self.matrix = Array2::from_shape_vec((vectors.len(), self.dimension), data)
            .map_err(|e| VectorIndexError::InsertError(e.to_string()))?;

        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorIndexError> {
        check_dimension(self.dimension, query.len())?;

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.matrix.dot(&ArrayView1::from(query));
        let hits = scores
            .iter()
            .enumerate()
            .map(|(position, &score)| SearchHit { position, score })
            .collect();

        Ok(top_k(hits, k))
    }

    fn len(&self) -> usize {
        self.matrix.nrows()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[axis] = 1.0;
        v
    }

    fn test_vectors() -> Vec<Vec<f32>> {
        let mut vec3 = vec![0.0; 8];
        vec3[0] = 0.8;
        vec3[1] = 0.6;
        vec![unit(8, 0), unit(8, 1), vec3, unit(8, 2)]
    }

    #[test]
    fn test_index_creation() {
        let index = FlatIndex::new(384);
        assert_eq!(index.dimension(), 384);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
        assert_eq!(index.kind(), IndexKind::Flat);
    }

    #[test]
    fn test_build_and_search() {
        let mut index = FlatIndex::new(8);
        index.build(&test_vectors()).unwrap();
        assert_eq!(index.len(), 4);

        let hits = index.search(&unit(8, 0), 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].position, 2);
        assert!((hits[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_search_clamps_to_corpus_size() {
        let mut index = FlatIndex::new(8);
        index.build(&test_vectors()).unwrap();

        let hits = index.search(&unit(8, 1), 100).unwrap();
        assert_eq!(hits.len(), 4);

        let mut positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        positions.sort_unstable();
        positions.dedup();
        assert_eq!(positions.len(), 4);

        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_ties_break_by_position() {
        let mut index = FlatIndex::new(4);
        index
            .build(&[unit(4, 1), unit(4, 2), unit(4, 3), unit(4, 1)])
            .unwrap();

        // Axis 0 is orthogonal to every stored vector, so all scores tie at 0.0
        let hits = index.search(&unit(4, 0), 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let hits = index.search(&unit(4, 1), 2).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 3]);
    }

    #[test]
    fn test_empty_index_and_zero_k() {
        let mut index = FlatIndex::new(8);
        assert!(index.search(&unit(8, 0), 5).unwrap().is_empty());

        index.build(&test_vectors()).unwrap();
        assert!(index.search(&unit(8, 0), 0).unwrap().is_empty());

        index.build(&[]).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mut index = FlatIndex::new(8);
        index.build(&test_vectors()).unwrap();
        index.build(&[unit(8, 5)]).unwrap();
        assert_eq!(index.len(), 1);

        let hits = index.search(&unit(8, 5), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 0);
    }

    #[test]
    fn test_dimension_validation() {
        let mut index = FlatIndex::new(384);

        let result = index.build(&[vec![1.0; 128]]);
        assert!(matches!(
            result,
            Err(VectorIndexError::InvalidDimension {
                expected: 384,
                actual: 128
            })
        ));

        let result = index.search(&[1.0; 3], 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_index_kind_parsing() {
        assert_eq!("flat".parse::<IndexKind>().unwrap(), IndexKind::Flat);
        assert_eq!("HNSW".parse::<IndexKind>().unwrap(), IndexKind::Hnsw);
        assert!("ivf".parse::<IndexKind>().is_err());
        assert_eq!(IndexKind::Hnsw.to_string(), "hnsw");
    }

    #[test]
    fn test_top_k_selection() {
        let hits: Vec<SearchHit> = [0.1, 0.9, 0.5, 0.9, -0.3]
            .iter()
            .enumerate()
            .map(|(position, &score)| SearchHit { position, score })
            .collect();

        let best = top_k(hits, 3);
        let positions: Vec<usize> = best.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 3, 2]);
    }
}
