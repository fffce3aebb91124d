use std::path::PathBuf;
use thiserror::Error;

use crate::corpus::CorpusError;
use crate::embedding::{EmbeddingError, VectorIndexError};
use crate::retrieval::{RerankError, RetrievalError};

/// Main error type for Sift
#[derive(Error, Debug)]
pub enum SiftError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Corpus loading errors
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    /// Embedding model errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector index errors
    #[error("Vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),

    /// Reranking model errors
    #[error("Reranker error: {0}")]
    Rerank(#[from] RerankError),

    /// Query execution errors
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// IPC server errors
    #[error("Server error: {0}")]
    Server(String),

    /// Server not reachable
    #[error("Server is not running at {socket:?}")]
    ServerNotRunning { socket: PathBuf },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Sift operations
pub type Result<T> = std::result::Result<T, SiftError>;
