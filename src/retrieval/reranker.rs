//! Cross-encoder reranking using FastEmbed

use crate::embedding::WordTokenizer;
use ahash::{AHashMap, AHashSet};
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

const TERM_OVERLAP_MODEL: &str = "term-overlap";

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Reranker returned {actual} scores for {expected} candidates")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Reranker produced a non-finite score for candidate {index}")]
    InvalidScore { index: usize },
}

/// Trait for models that score (query, document) pairs jointly
///
/// Backends implement [`Reranker::score_batch`]; callers use [`Reranker::score`],
/// which guarantees one finite score per candidate, in candidate order.
pub trait Reranker: Send + Sync {
    /// Raw relevance scores, one per candidate, in candidate order
    fn score_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, RerankError>;

    fn model_name(&self) -> &str;

    /// Score every candidate against `query`. Higher means more relevant.
    fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, RerankError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let scores = self.score_batch(query, candidates)?;

        if scores.len() != candidates.len() {
            return Err(RerankError::CountMismatch {
                expected: candidates.len(),
                actual: scores.len(),
            });
        }

        if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
            return Err(RerankError::InvalidScore { index });
        }

        Ok(scores)
    }
}

/// Build the reranker named by `model_name`.
///
/// `term-overlap` selects the offline [`TermOverlapReranker`]; anything else is looked
/// up in the FastEmbed reranker table.
pub fn reranker_for_model(
    model_name: &str,
    batch_size: usize,
    cache_dir: Option<PathBuf>,
) -> Result<Arc<dyn Reranker>, RerankError> {
    if model_name == TERM_OVERLAP_MODEL {
        return Ok(Arc::new(TermOverlapReranker::new()?));
    }

    let reranker = CrossEncoderReranker::new(model_name, batch_size, cache_dir)?;
    Ok(Arc::new(reranker))
}

/// Cross-encoder reranker for improving result precision
pub struct CrossEncoderReranker {
    model: Arc<TextRerank>,
    model_name: String,
    batch_size: usize,
}

impl CrossEncoderReranker {
    /// Create a new reranker with specified model
    ///
    /// # Arguments
    /// * `model_name` - Model name (e.g., "BAAI/bge-reranker-base")
    /// * `batch_size` - Number of pairs scored per forward pass
    /// * `cache_dir` - Model cache directory (defaults to `.fastembed_cache/`)
    pub fn new(
        model_name: &str,
        batch_size: usize,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, RerankError> {
        let reranker_model = match model_name {
            "bge-reranker-base" | "BAAI/bge-reranker-base" => RerankerModel::BGERerankerBase,
            "bge-reranker-v2-m3" | "rozgo/bge-reranker-v2-m3" => RerankerModel::BGERerankerV2M3,
            "jina-reranker-v1-turbo-en" | "jinaai/jina-reranker-v1-turbo-en" => {
                RerankerModel::JINARerankerV1TurboEn
            }
            "jina-reranker-v2-base-multilingual"
            | "jinaai/jina-reranker-v2-base-multilingual" => {
                RerankerModel::JINARerankerV2BaseMultiligual
            }
            _ => {
                return Err(RerankError::InitializationError(format!(
                    "Unsupported reranker: {}. Supported: bge-reranker-base, bge-reranker-v2-m3, jina-reranker-v1-turbo-en, jina-reranker-v2-base-multilingual, term-overlap",
                    model_name
                )));
            }
        };

        tracing::info!("Initializing reranker model: {}", model_name);

        let mut init_options = RerankInitOptions::new(reranker_model).with_show_download_progress(true);
        if let Some(dir) = cache_dir {
            init_options = init_options.with_cache_dir(dir);
        }

        let model = TextRerank::try_new(init_options)
            .map_err(|e| RerankError::InitializationError(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            batch_size: batch_size.max(1),
        })
    }

    /// Create reranker with default model (bge-reranker-base)
    pub fn with_default_model() -> Result<Self, RerankError> {
        Self::new("bge-reranker-base", 32, None)
    }
}

impl Reranker for CrossEncoderReranker {
    fn score_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, RerankError> {
        let documents: Vec<&str> = candidates.iter().map(|s| s.as_str()).collect();

        // FastEmbed returns results sorted by score; put them back in candidate order
        let results = self
            .model
            .rerank(query, documents, false, Some(self.batch_size))
            .map_err(|e| RerankError::RerankingError(e.to_string()))?;

        if results.len() != candidates.len() {
            return Err(RerankError::CountMismatch {
                expected: candidates.len(),
                actual: results.len(),
            });
        }

        let mut scores = vec![f32::NAN; candidates.len()];
        for result in results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                RerankError::RerankingError(format!(
                    "Result index {} out of range for {} candidates",
                    result.index,
                    candidates.len()
                ))
            })?;
            *slot = result.score;
        }

        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Lexical reranker scoring candidates by query-term coverage
///
/// Score is the fraction of distinct query terms present in the candidate, plus a
/// small bonus for repeated occurrences. No model download; deterministic.
pub struct TermOverlapReranker {
    tokenizer: WordTokenizer,
}

impl TermOverlapReranker {
    pub fn new() -> Result<Self, RerankError> {
        let tokenizer =
            WordTokenizer::new().map_err(|e| RerankError::InitializationError(e.to_string()))?;
        Ok(Self { tokenizer })
    }

    fn score_one(&self, query_terms: &AHashSet<String>, candidate: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }

        let mut counts: AHashMap<String, u32> = AHashMap::new();
        for token in self.tokenizer.tokens(candidate) {
            *counts.entry(token).or_insert(0) += 1;
        }

        let mut matched = 0usize;
        let mut repeats = 0.0f32;
        for term in query_terms {
            if let Some(&count) = counts.get(term) {
                matched += 1;
                repeats += (count as f32).ln_1p();
            }
        }

        let terms = query_terms.len() as f32;
        matched as f32 / terms + 0.1 * repeats / terms
    }
}

impl Reranker for TermOverlapReranker {
    fn score_batch(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, RerankError> {
        let query_terms: AHashSet<String> = self.tokenizer.tokens(query).collect();

        Ok(candidates
            .iter()
            .map(|candidate| self.score_one(&query_terms, candidate))
            .collect())
    }

    fn model_name(&self) -> &str {
        TERM_OVERLAP_MODEL
    }
}
