// Loader for arXiv metadata dumps (JSON array or JSON lines)

use super::{Corpus, CorpusError, Document, Metadata};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{info, warn};

/// On-disk layout of a metadata dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// A single JSON array of records
    JsonArray,
    /// One JSON object per line
    JsonLines,
}

impl RecordFormat {
    /// Detect the layout from the first non-whitespace byte
    pub fn detect(content: &str) -> Self {
        match content.trim_start().as_bytes().first() {
            Some(b'[') => RecordFormat::JsonArray,
            _ => RecordFormat::JsonLines,
        }
    }
}

/// Load an arXiv metadata dump into a corpus.
///
/// Document text is `title + " " + abstract`; every record field is kept as metadata.
/// Records without an `id`, or with no title and abstract, are skipped.
pub fn load_arxiv_metadata(path: &Path) -> Result<Corpus, CorpusError> {
    let content = std::fs::read_to_string(path).map_err(|e| CorpusError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let records = parse_records(&content)?;
    let total = records.len();

    let documents: Vec<Document> = records
        .into_iter()
        .enumerate()
        .filter_map(|(position, record)| record_to_document(position, record))
        .collect();

    if documents.len() < total {
        warn!(
            "Skipped {} of {} records without id or text",
            total - documents.len(),
            total
        );
    }

    info!("Loaded {} documents from {:?}", documents.len(), path);

    Corpus::from_documents(documents)
}

fn parse_records(content: &str) -> Result<Vec<Map<String, Value>>, CorpusError> {
    match RecordFormat::detect(content) {
        RecordFormat::JsonArray => {
            serde_json::from_str(content).map_err(|e| CorpusError::Parse {
                line: e.line(),
                message: e.to_string(),
            })
        }
        RecordFormat::JsonLines => content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| CorpusError::Parse {
                    line: n + 1,
                    message: e.to_string(),
                })
            })
            .collect(),
    }
}

fn record_to_document(position: usize, record: Map<String, Value>) -> Option<Document> {
    let id = match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            warn!("Record {} has no id, skipping", position);
            return None;
        }
    };

    let title = string_field(&record, "title");
    let summary = string_field(&record, "abstract");
    let text = format!("{} {}", title, summary);
    if text.trim().is_empty() {
        warn!("Record {} ({}) has no title or abstract, skipping", position, id);
        return None;
    }

    let metadata: Metadata = record
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect();

    Some(Document { id, text, metadata })
}

fn string_field<'a>(record: &'a Map<String, Value>, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or("")
}
