//! Two-stage retrieval: dense vector search followed by cross-encoder reranking
//!
//! A query is encoded once, the `initial_k` nearest documents are fetched from the
//! vector index, every candidate is rescored by the reranker, and the best `top_k`
//! by rerank score are returned together with per-stage latencies.

mod index;
mod pipeline;
mod reranker;
mod results;

pub use index::DocumentIndex;
pub use pipeline::{
    ErrorKind, PipelineOptions, RetrievalError, RetrievalPipeline, RetrievalPipelineBuilder, Stage,
};
pub use reranker::{
    reranker_for_model, CrossEncoderReranker, RerankError, Reranker, TermOverlapReranker,
};
pub use results::{Candidate, RerankedResult, RetrievalOutput, StageTimings};

use serde::{Deserialize, Serialize};

/// Default number of results returned to the caller
pub const DEFAULT_TOP_K: usize = 5;

/// Default number of candidates fetched before reranking
pub const DEFAULT_INITIAL_K: usize = 10;

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_initial_k() -> usize {
    DEFAULT_INITIAL_K
}

/// A single retrieval request
///
/// `initial_k` smaller than `top_k` is accepted: the candidate pool caps the result
/// count, so at most `initial_k` results come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Free-text query
    pub query: String,

    /// Number of results to return
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Number of candidates to fetch from the vector index for reranking
    #[serde(default = "default_initial_k")]
    pub initial_k: usize,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, top_k: usize, initial_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            initial_k,
        }
    }

    /// Request with the default `top_k` and `initial_k`
    pub fn with_defaults(query: impl Into<String>) -> Self {
        Self::new(query, DEFAULT_TOP_K, DEFAULT_INITIAL_K)
    }

    /// Reject requests that must not reach the encoder
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.query.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "Query text cannot be empty".to_string(),
            ));
        }
        if self.top_k < 1 {
            return Err(RetrievalError::InvalidRequest(
                "top_k must be at least 1".to_string(),
            ));
        }
        if self.initial_k < 1 {
            return Err(RetrievalError::InvalidRequest(
                "initial_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on the number of results, before the corpus size is considered
    pub fn result_limit(&self) -> usize {
        self.top_k.min(self.initial_k)
    }
}
