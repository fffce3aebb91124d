use crate::config::{parse_duration, Config, SCHEMA_VERSION};
use crate::embedding::IndexKind;
use crate::error::{Result, SiftError, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem before failing
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_corpus(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_reranker(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_server(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SiftError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_corpus(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when the corpus is loaded; `~` is not expanded yet
        if config.corpus.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "corpus.path",
                "Corpus path cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.trim().is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.index.kind != IndexKind::Hnsw {
            return;
        }

        if config.index.hnsw_m < 2 {
            errors.push(ValidationError::new(
                "index.hnsw_m",
                "HNSW M must be at least 2",
            ));
        }

        if config.index.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_reranker(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.reranker.batch_size == 0 {
            errors.push(ValidationError::new(
                "reranker.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.reranker.model.trim().is_empty() {
            errors.push(ValidationError::new(
                "reranker.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.default_top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_top_k",
                "default_top_k must be at least 1",
            ));
        }

        if retrieval.default_initial_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.default_initial_k",
                "default_initial_k must be at least 1",
            ));
        } else if retrieval.default_initial_k < retrieval.default_top_k {
            tracing::warn!(
                "retrieval.default_initial_k ({}) is below default_top_k ({}); at most {} results will be returned",
                retrieval.default_initial_k,
                retrieval.default_top_k,
                retrieval.default_initial_k
            );
        }

        if parse_duration(&retrieval.query_timeout).is_none() {
            errors.push(ValidationError::new(
                "retrieval.query_timeout",
                format!("Invalid duration format: {}", retrieval.query_timeout),
            ));
        }
    }

    fn validate_server(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.server.socket_path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "server.socket_path",
                "Socket path cannot be empty",
            ));
        }
    }
}
