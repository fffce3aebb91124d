//! Corpus documents paired with their vector index

use super::{Candidate, RetrievalError};
use crate::corpus::{Corpus, Document};
use crate::embedding::{
    new_index, BatchEncoder, Embedder, IndexKind, IndexOptions, ModelBinding, VectorIndex,
    VectorIndexError,
};
use std::sync::Arc;
use tracing::info;

/// Searchable corpus: document `i` is stored at vector position `i`
///
/// Built once at startup and immutable afterwards. The embedding binding used at
/// build time is recorded so a query encoder from a different space can be refused.
pub struct DocumentIndex {
    binding: ModelBinding,
    vectors: Box<dyn VectorIndex>,
    documents: Vec<Arc<Document>>,
}

impl DocumentIndex {
    /// Encode every document and build the vector index
    pub fn build(
        embedder: &dyn Embedder,
        corpus: Corpus,
        options: &IndexOptions,
        batch_size: usize,
    ) -> Result<Self, RetrievalError> {
        let binding = embedder.binding();
        info!(
            "Building {} index for {} documents with {}",
            options.kind,
            corpus.len(),
            binding
        );

        let (embeddings, stats) = BatchEncoder::new(embedder, batch_size).encode_all(&corpus.texts())?;

        let mut vectors = new_index(binding.dimension, options);
        vectors.build(&embeddings)?;

        let documents: Vec<Arc<Document>> = corpus.into_documents().into_iter().map(Arc::new).collect();

        if vectors.len() != documents.len() {
            return Err(RetrievalError::Internal(format!(
                "Index holds {} vectors for {} documents",
                vectors.len(),
                documents.len()
            )));
        }

        info!(
            "Index ready: {} documents in {}ms",
            documents.len(),
            stats.duration_ms
        );

        Ok(Self {
            binding,
            vectors,
            documents,
        })
    }

    /// Nearest documents to a unit-norm query vector, best first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>, VectorIndexError> {
        let hits = self.vectors.search(query, k)?;

        hits.into_iter()
            .map(|hit| {
                let document = self.documents.get(hit.position).ok_or_else(|| {
                    VectorIndexError::SearchError(format!(
                        "Hit position {} outside corpus of {} documents",
                        hit.position,
                        self.documents.len()
                    ))
                })?;
                Ok(Candidate {
                    document: Arc::clone(document),
                    vector_score: hit.score,
                })
            })
            .collect()
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    pub fn document(&self, position: usize) -> Option<&Arc<Document>> {
        self.documents.get(position)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn kind(&self) -> IndexKind {
        self.vectors.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    fn corpus() -> Corpus {
        Corpus::from_parts(
            vec![
                "Attention mechanisms for machine translation".to_string(),
                "Convolutional networks for image classification".to_string(),
                "Reinforcement learning for robotic control".to_string(),
            ],
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![Default::default(); 3],
        )
        .unwrap()
    }

    #[test]
    fn test_build_records_binding() {
        let embedder = HashingEmbedder::new(128).unwrap();
        let index = DocumentIndex::build(&embedder, corpus(), &IndexOptions::default(), 2).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.binding(), &ModelBinding::new("hashing-128", 128));
        assert_eq!(index.kind(), IndexKind::Flat);
        assert_eq!(index.document(1).unwrap().id, "b");
        assert!(index.document(3).is_none());
    }

    #[test]
    fn test_search_maps_positions_to_documents() {
        let embedder = HashingEmbedder::new(128).unwrap();
        let index = DocumentIndex::build(&embedder, corpus(), &IndexOptions::default(), 8).unwrap();

        let query = embedder
            .encode(&["image classification with convolutional networks".to_string()])
            .unwrap()
            .remove(0);
        let candidates = index.search(&query, 10).unwrap();

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].id(), "b");
        for pair in candidates.windows(2) {
            assert!(pair[0].vector_score >= pair[1].vector_score);
        }
    }

    #[test]
    fn test_empty_corpus() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let empty = Corpus::from_parts(vec![], vec![], vec![]).unwrap();
        let index = DocumentIndex::build(&embedder, empty, &IndexOptions::default(), 8).unwrap();

        assert!(index.is_empty());
        let query = embedder.encode(&["anything".to_string()]).unwrap().remove(0);
        assert!(index.search(&query, 5).unwrap().is_empty());
    }
}
