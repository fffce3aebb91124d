//! Candidate and result structures with per-stage timing

use crate::corpus::{Document, Metadata};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A document fetched by vector search, awaiting reranking
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Shared handle to the indexed document
    pub document: Arc<Document>,

    /// Inner-product similarity with the query vector
    pub vector_score: f32,
}

impl Candidate {
    pub fn id(&self) -> &str {
        &self.document.id
    }

    pub fn text(&self) -> &str {
        &self.document.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.document.metadata
    }
}

/// Final output unit; results are ranked by `score` descending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankedResult {
    /// Document ID from the corpus
    pub id: String,

    /// Rerank score (model-specific scale, higher is better)
    pub score: f32,

    /// Indexed document text
    pub text: String,

    /// Original document metadata, unchanged
    #[serde(rename = "meta")]
    pub metadata: Metadata,

    /// Vector similarity from the first stage
    #[serde(default)]
    pub vector_score: f32,
}

impl RerankedResult {
    pub(crate) fn from_candidate(candidate: &Candidate, score: f32) -> Self {
        Self {
            id: candidate.id().to_string(),
            score,
            text: candidate.text().to_string(),
            metadata: candidate.metadata().clone(),
            vector_score: candidate.vector_score,
        }
    }

    /// Get a short preview of `s` (first N characters)
    pub fn preview(s: &str, max_chars: usize) -> String {
        match s.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}...", &s[..cut]),
            None => s.to_string(),
        }
    }
}

/// Wall-clock duration of each pipeline stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    #[serde(with = "serde_secs")]
    pub encode: Duration,
    #[serde(with = "serde_secs")]
    pub search: Duration,
    #[serde(with = "serde_secs")]
    pub rerank: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.encode + self.search + self.rerank
    }
}

/// Ranked results of one query plus stage latencies
///
/// Serializes as `{results, encode, search, rerank}` with latencies in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutput {
    pub results: Vec<RerankedResult>,
    #[serde(flatten)]
    pub timings: StageTimings,
}

/// Duration as fractional seconds
mod serde_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(RerankedResult::preview("short", 10), "short");
        assert_eq!(RerankedResult::preview("abcdef", 3), "abc...");
        assert_eq!(RerankedResult::preview("éèêë", 2), "éè...");
    }

    #[test]
    fn test_output_json_shape() {
        let mut meta = Metadata::new();
        meta.insert("title".to_string(), "Attention Is All You Need".to_string());

        let output = RetrievalOutput {
            results: vec![RerankedResult {
                id: "1706.03762".to_string(),
                score: 7.5,
                text: "Attention Is All You Need The dominant sequence models".to_string(),
                metadata: meta,
                vector_score: 0.62,
            }],
            timings: StageTimings {
                encode: Duration::from_millis(12),
                search: Duration::from_millis(3),
                rerank: Duration::from_millis(250),
            },
        };

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["results"][0]["id"], "1706.03762");
        assert_eq!(json["results"][0]["meta"]["title"], "Attention Is All You Need");
        assert!((json["encode"].as_f64().unwrap() - 0.012).abs() < 1e-9);
        assert!((json["rerank"].as_f64().unwrap() - 0.25).abs() < 1e-9);

        let back: RetrievalOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back.results[0].id, "1706.03762");
        assert_eq!(back.timings.search, Duration::from_millis(3));
    }
}
