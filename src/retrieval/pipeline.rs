//! Retrieval pipeline: encode, search, rerank, truncate

use super::{
    Candidate, DocumentIndex, QueryRequest, RerankError, RerankedResult, Reranker,
    RetrievalOutput, StageTimings,
};
use crate::corpus::Corpus;
use crate::embedding::{Embedder, EmbeddingError, IndexOptions, ModelBinding, VectorIndexError};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Pipeline stage a query is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for an admission slot
    Queued,
    Encoding,
    Searching,
    Reranking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Queued => write!(f, "queued"),
            Stage::Encoding => write!(f, "encoding"),
            Stage::Searching => write!(f, "searching"),
            Stage::Reranking => write!(f, "reranking"),
        }
    }
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Pipeline is missing its {0}")]
    MissingComponent(&'static str),

    #[error("Model mismatch: index was built with {index}, query embedder is {embedder}")]
    ModelMismatch {
        index: ModelBinding,
        embedder: ModelBinding,
    },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector search failed: {0}")]
    VectorIndex(#[from] VectorIndexError),

    #[error("Reranking failed: {0}")]
    Reranking(#[from] RerankError),

    #[error("Query timed out after {elapsed_ms}ms while {stage}")]
    Timeout { stage: Stage, elapsed_ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure class reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request or mismatched components; retrying will not help
    Configuration,
    /// Embedding or reranking model failed
    UpstreamModel,
    Timeout,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::UpstreamModel => write!(f, "upstream_model"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

impl RetrievalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetrievalError::InvalidRequest(_)
            | RetrievalError::MissingComponent(_)
            | RetrievalError::ModelMismatch { .. } => ErrorKind::Configuration,
            RetrievalError::Embedding(_) | RetrievalError::Reranking(_) => {
                ErrorKind::UpstreamModel
            }
            RetrievalError::Timeout { .. } => ErrorKind::Timeout,
            RetrievalError::VectorIndex(_) | RetrievalError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Execution limits for concurrent queries
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Whole-query deadline, measured from admission request to final result
    pub query_timeout: Option<Duration>,

    /// Maximum number of queries executing at once; others wait in line
    pub max_in_flight: Option<usize>,

    /// Run at most one model call (encode or rerank) at a time across all queries
    pub serialize_model_calls: bool,
}

/// Builder for [`RetrievalPipeline`]
#[derive(Default)]
pub struct RetrievalPipelineBuilder {
    embedder: Option<Arc<dyn Embedder>>,
    reranker: Option<Arc<dyn Reranker>>,
    index: Option<Arc<DocumentIndex>>,
    options: PipelineOptions,
}

impl RetrievalPipelineBuilder {
    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn index(mut self, index: Arc<DocumentIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Assemble the pipeline, refusing an embedder whose space differs from the index's
    pub fn build(self) -> Result<RetrievalPipeline, RetrievalError> {
        let embedder = self
            .embedder
            .ok_or(RetrievalError::MissingComponent("embedder"))?;
        let reranker = self
            .reranker
            .ok_or(RetrievalError::MissingComponent("reranker"))?;
        let index = self.index.ok_or(RetrievalError::MissingComponent("index"))?;

        let binding = embedder.binding();
        if &binding != index.binding() {
            return Err(RetrievalError::ModelMismatch {
                index: index.binding().clone(),
                embedder: binding,
            });
        }

        if self.options.max_in_flight == Some(0) {
            return Err(RetrievalError::InvalidRequest(
                "max_in_flight must be at least 1".to_string(),
            ));
        }

        let admission = self
            .options
            .max_in_flight
            .map(|permits| Arc::new(Semaphore::new(permits)));
        let model_gate = self
            .options
            .serialize_model_calls
            .then(|| Arc::new(Mutex::new(())));

        Ok(RetrievalPipeline {
            embedder,
            reranker,
            index,
            options: self.options,
            admission,
            model_gate,
        })
    }
}

/// Two-stage retriever shared by all concurrent queries
///
/// Every component is read-only after construction; a query holds no state beyond
/// its own call.
pub struct RetrievalPipeline {
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    index: Arc<DocumentIndex>,
    options: PipelineOptions,
    admission: Option<Arc<Semaphore>>,
    model_gate: Option<Arc<Mutex<()>>>,
}

impl RetrievalPipeline {
    pub fn builder() -> RetrievalPipelineBuilder {
        RetrievalPipelineBuilder::default()
    }

    /// Index `corpus` with `embedder` and wrap it in a pipeline
    ///
    /// Blocking: encodes the whole corpus before returning.
    pub fn from_corpus(
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        corpus: Corpus,
        index_options: &IndexOptions,
        batch_size: usize,
        options: PipelineOptions,
    ) -> Result<Self, RetrievalError> {
        let index = DocumentIndex::build(embedder.as_ref(), corpus, index_options, batch_size)?;

        Self::builder()
            .embedder(embedder)
            .reranker(reranker)
            .index(Arc::new(index))
            .options(options)
            .build()
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn reranker(&self) -> &dyn Reranker {
        self.reranker.as_ref()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run one query through all stages
    ///
    /// Results are ordered by rerank score descending; equal scores keep vector-search
    /// order. At most `min(top_k, initial_k, corpus size)` results are returned.
    pub async fn retrieve(&self, request: &QueryRequest) -> Result<RetrievalOutput, RetrievalError> {
        request.validate()?;

        let query_id = Uuid::new_v4();
        let span = info_span!(
            "retrieve",
            %query_id,
            top_k = request.top_k,
            initial_k = request.initial_k
        );

        self.execute(request).instrument(span).await
    }

    async fn execute(&self, request: &QueryRequest) -> Result<RetrievalOutput, RetrievalError> {
        let started = Instant::now();
        let deadline = self
            .options
            .query_timeout
            .and_then(|timeout| started.checked_add(timeout));

        // Shared with every stage task so an abandoned model call keeps its slot
        let permit = Arc::new(self.admit(deadline, started).await?);

        // Encoding
        let stage_start = Instant::now();
        let embedder = Arc::clone(&self.embedder);
        let gate = self.model_gate.clone();
        let query = vec![request.query.clone()];
        let mut encoded = self
            .run_stage(Stage::Encoding, deadline, started, &permit, move || {
                let _guard = hold(&gate);
                embedder.encode(&query).map_err(RetrievalError::from)
            })
            .await?;
        let query_vector = encoded
            .pop()
            .ok_or_else(|| RetrievalError::Internal("Embedder returned no query vector".to_string()))?;
        let encode = stage_start.elapsed();
        debug!("Encoded query in {:?}", encode);

        // Searching
        let stage_start = Instant::now();
        let index = Arc::clone(&self.index);
        let initial_k = request.initial_k;
        let candidates = self
            .run_stage(Stage::Searching, deadline, started, &permit, move || {
                index
                    .search(&query_vector, initial_k)
                    .map_err(RetrievalError::from)
            })
            .await?;
        let search = stage_start.elapsed();
        debug!("Found {} candidates in {:?}", candidates.len(), search);

        // Reranking
        let stage_start = Instant::now();
        let texts: Vec<String> = candidates.iter().map(|c| c.text().to_string()).collect();
        let scores = if texts.is_empty() {
            Vec::new()
        } else {
            let reranker = Arc::clone(&self.reranker);
            let gate = self.model_gate.clone();
            let query = request.query.clone();
            self.run_stage(Stage::Reranking, deadline, started, &permit, move || {
                let _guard = hold(&gate);
                reranker.score(&query, &texts).map_err(RetrievalError::from)
            })
            .await?
        };
        let rerank = stage_start.elapsed();
        debug!("Reranked {} candidates in {:?}", scores.len(), rerank);

        let results = rank_candidates(&candidates, &scores, request.top_k)?;

        let timings = StageTimings {
            encode,
            search,
            rerank,
        };
        info!(
            "Retrieved {} results in {}ms",
            results.len(),
            timings.total().as_millis()
        );

        Ok(RetrievalOutput { results, timings })
    }

    /// Wait for an admission slot when `max_in_flight` is set
    async fn admit(
        &self,
        deadline: Option<Instant>,
        started: Instant,
    ) -> Result<Option<OwnedSemaphorePermit>, RetrievalError> {
        let Some(admission) = &self.admission else {
            return Ok(None);
        };

        let acquire = Arc::clone(admission).acquire_owned();
        let permit = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, acquire)
                .await
                .map_err(|_| timed_out(Stage::Queued, started))?,
            None => acquire.await,
        };

        permit
            .map(Some)
            .map_err(|_| RetrievalError::Internal("Admission queue closed".to_string()))
    }

    /// Run blocking stage work off the async runtime, bounded by the query deadline
    ///
    /// The task holds the admission permit until `work` returns, even if the deadline
    /// has already abandoned it.
    async fn run_stage<T, F>(
        &self,
        stage: Stage,
        deadline: Option<Instant>,
        started: Instant,
        permit: &Arc<Option<OwnedSemaphorePermit>>,
        work: F,
    ) -> Result<T, RetrievalError>
    where
        F: FnOnce() -> Result<T, RetrievalError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(permit);
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        });

        let joined = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, handle)
                .await
                .map_err(|_| timed_out(stage, started))?,
            None => handle.await,
        };

        joined.map_err(|e| RetrievalError::Internal(format!("{} task failed: {}", stage, e)))?
    }
}

fn timed_out(stage: Stage, started: Instant) -> RetrievalError {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    warn!("Query timed out after {}ms while {}", elapsed_ms, stage);
    RetrievalError::Timeout { stage, elapsed_ms }
}

/// Lock the model gate, if any. A poisoned gate is still usable: it guards no data.
fn hold(gate: &Option<Arc<Mutex<()>>>) -> Option<MutexGuard<'_, ()>> {
    gate.as_ref()
        .map(|gate| gate.lock().unwrap_or_else(PoisonError::into_inner))
}

/// Order candidates by rerank score, keeping vector order for ties, and keep `top_k`
pub(crate) fn rank_candidates(
    candidates: &[Candidate],
    scores: &[f32],
    top_k: usize,
) -> Result<Vec<RerankedResult>, RetrievalError> {
    if candidates.len() != scores.len() {
        return Err(RetrievalError::Internal(format!(
            "{} rerank scores for {} candidates",
            scores.len(),
            candidates.len()
        )));
    }

    let mut ranked: Vec<(&Candidate, f32)> = candidates.iter().zip(scores.iter().copied()).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(top_k);

    Ok(ranked
        .into_iter()
        .map(|(candidate, score)| RerankedResult::from_candidate(candidate, score))
        .collect())
}
