//! Corpus model: documents, their metadata, and the aligned-sequence constructor
//!
//! The corpus is static for the process lifetime. It is assembled once from three
//! parallel sequences (texts, ids, metadata) and handed to the index builder.

mod loader;

pub use loader::{load_arxiv_metadata, RecordFormat};

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Free-form document metadata (string keys to string values)
pub type Metadata = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Sequence length mismatch: {texts} texts, {ids} ids, {metadata} metadata records")]
    LengthMismatch {
        texts: usize,
        ids: usize,
        metadata: usize,
    },

    #[error("Duplicate document id: {0}")]
    DuplicateId(String),

    #[error("Failed to read corpus file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse corpus record {line}: {message}")]
    Parse { line: usize, message: String },
}

/// A single retrievable document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }
}

/// Lookup helpers for the metadata fields the display layer expects
/// (`title`, `authors`, `categories`, `update_date`, `abstract`)
pub trait MetadataExt {
    /// Field value, or `""` when absent
    fn field(&self, name: &str) -> &str;
}

impl MetadataExt for Metadata {
    fn field(&self, name: &str) -> &str {
        self.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Immutable, position-ordered collection of documents
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    /// Assemble a corpus from three aligned sequences.
    ///
    /// Position `i` of each sequence describes the same document.
    pub fn from_parts(
        texts: Vec<String>,
        ids: Vec<String>,
        metadata: Vec<Metadata>,
    ) -> Result<Self, CorpusError> {
        if texts.len() != ids.len() || ids.len() != metadata.len() {
            return Err(CorpusError::LengthMismatch {
                texts: texts.len(),
                ids: ids.len(),
                metadata: metadata.len(),
            });
        }

        let documents = texts
            .into_iter()
            .zip(ids)
            .zip(metadata)
            .map(|((text, id), metadata)| Document { id, text, metadata })
            .collect();

        Self::from_documents(documents)
    }

    /// Build a corpus from already-assembled documents
    pub fn from_documents(documents: Vec<Document>) -> Result<Self, CorpusError> {
        let mut seen: AHashSet<&str> = AHashSet::with_capacity(documents.len());
        for document in &documents {
            if !seen.insert(document.id.as_str()) {
                return Err(CorpusError::DuplicateId(document.id.clone()));
            }
        }

        Ok(Self { documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn texts(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.text.clone()).collect()
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(title: &str) -> Metadata {
        let mut m = Metadata::new();
        m.insert("title".to_string(), title.to_string());
        m
    }

    #[test]
    fn test_from_parts_keeps_positions() {
        let corpus = Corpus::from_parts(
            vec!["alpha text".into(), "beta text".into()],
            vec!["a".into(), "b".into()],
            vec![meta("Alpha"), meta("Beta")],
        )
        .unwrap();

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.documents()[0].id, "a");
        assert_eq!(corpus.documents()[1].text, "beta text");
        assert_eq!(corpus.documents()[1].metadata.field("title"), "Beta");
    }

    #[test]
    fn test_length_mismatch() {
        let result = Corpus::from_parts(
            vec!["one".into(), "two".into()],
            vec!["1".into()],
            vec![Metadata::new(), Metadata::new()],
        );

        assert!(matches!(
            result,
            Err(CorpusError::LengthMismatch {
                texts: 2,
                ids: 1,
                metadata: 2
            })
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = Corpus::from_parts(
            vec!["one".into(), "two".into()],
            vec!["x".into(), "x".into()],
            vec![Metadata::new(), Metadata::new()],
        );
        assert!(matches!(result, Err(CorpusError::DuplicateId(id)) if id == "x"));
    }

    #[test]
    fn test_missing_field_defaults_to_empty() {
        let m = meta("Only a title");
        assert_eq!(m.field("authors"), "");
        assert_eq!(m.field("title"), "Only a title");
    }

    #[test]
    fn test_empty_corpus() {
        let corpus = Corpus::from_parts(vec![], vec![], vec![]).unwrap();
        assert!(corpus.is_empty());
        assert!(corpus.texts().is_empty());
    }
}
