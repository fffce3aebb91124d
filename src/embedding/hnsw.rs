/// HNSW vector index for approximate similarity search
use super::vector_index::{check_dimension, top_k};
use super::{IndexKind, SearchHit, VectorIndex, VectorIndexError};
use hnsw_rs::prelude::*;

/// Upper bound on graph layers, as recommended by hnsw_rs
const MAX_LAYERS: usize = 16;

/// HNSW index wrapper
///
/// Provides approximate nearest neighbor search with sub-linear query time.
/// Uses cosine distance, which equals `1 - <a, b>` on normalized vectors and stays
/// non-negative when rounding pushes a self-similarity above 1.0.
/// Recall below 1.0 means some true top-k neighbors can be missed; raise
/// `ef_search` to trade latency for recall.
pub struct HnswIndex {
    /// Inner HNSW graph, `None` until built
    graph: Option<Hnsw<'static, f32, DistCosine>>,
    dimension: usize,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    count: usize,
}

impl HnswIndex {
    /// Create a new, empty index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `m` - HNSW M parameter (number of connections per layer)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    /// * `ef_search` - HNSW search parameter (higher = better recall, slower search)
    pub fn new(dimension: usize, m: usize, ef_construction: usize, ef_search: usize) -> Self {
        Self {
            graph: None,
            dimension,
            m: m.max(2),
            ef_construction: ef_construction.max(1),
            ef_search: ef_search.max(1),
            count: 0,
        }
    }
}

impl VectorIndex for HnswIndex {
    fn build(&mut self, vectors: &[Vec<f32>]) -> Result<(), VectorIndexError> {
        for vector in vectors {
            check_dimension(self.dimension, vector.len())?;
        }

        if vectors.is_empty() {
            self.graph = None;
            self.count = 0;
            return Ok(());
        }

        let graph = Hnsw::<f32, DistCosine>::new(
            self.m,
            vectors.len(),
            MAX_LAYERS,
            self.ef_construction,
            DistCosine,
        );

        let data: Vec<(&[f32], usize)> = vectors
            .iter()
            .enumerate()
            .map(|(position, v)| (v.as_slice(), position))
            .collect();
        graph.parallel_insert_slice(&data);

        tracing::debug!(
            "Built HNSW index with {} vectors (M={}, ef_construction={})",
            vectors.len(),
            self.m,
            self.ef_construction
        );

        self.graph = Some(graph);
        self.count = vectors.len();
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, VectorIndexError> {
        check_dimension(self.dimension, query.len())?;

        let Some(graph) = &self.graph else {
            return Ok(Vec::new());
        };

        let k = k.min(self.count);
        if k == 0 {
            return Ok(Vec::new());
        }

        let ef = self.ef_search.max(k);
        let neighbours = graph.search(query, k, ef);

        let mut seen = vec![false; self.count];
        let hits = neighbours
            .into_iter()
            .filter(|n| n.d_id < self.count && !std::mem::replace(&mut seen[n.d_id], true))
            .map(|n| SearchHit {
                position: n.d_id,
                // DistCosine is 1 - cos(a, b), clamped at 0
                score: 1.0 - n.distance,
            })
            .collect();

        Ok(top_k(hits, k))
    }

    fn len(&self) -> usize {
        self.count
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Hnsw
    }
}
