/// Batch encoder for corpus-sized embedding runs
use super::{Embedder, EmbeddingError};
use std::time::Instant;
use tracing::{debug, info};

/// Summary of a batch encoding run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeStats {
    pub encoded: usize,
    pub batches: usize,
    pub duration_ms: u64,
}

/// Encodes large text collections in fixed-size batches
///
/// Batch size only bounds how much text reaches the model per call; the resulting
/// vectors are the same for any batch size.
pub struct BatchEncoder<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
}

impl<'a> BatchEncoder<'a> {
    /// Create a new batch encoder
    ///
    /// # Arguments
    /// * `embedder` - Embedder used for every batch
    /// * `batch_size` - Number of texts to encode in one call (0 is treated as 1)
    pub fn new(embedder: &'a dyn Embedder, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Encode every text, returning vectors in input order
    pub fn encode_all(
        &self,
        texts: &[String],
    ) -> Result<(Vec<Vec<f32>>, EncodeStats), EmbeddingError> {
        let start = Instant::now();
        let total = texts.len();
        let total_batches = total.div_ceil(self.batch_size);

        info!(
            "Encoding {} documents with {} in {} batches",
            total,
            self.embedder.model_name(),
            total_batches
        );

        let mut vectors = Vec::with_capacity(total);
        let mut next_report = 10;

        for (batch, chunk) in texts.chunks(self.batch_size).enumerate() {
            let offset = batch * self.batch_size;
            let embeddings = self.embedder.encode(chunk).map_err(|e| match e {
                EmbeddingError::ZeroNorm { index } => EmbeddingError::ZeroNorm {
                    index: offset + index,
                },
                other => other,
            })?;

            vectors.extend(embeddings);
            debug!("Encoded batch {}/{}", batch + 1, total_batches);

            let percent = vectors.len() * 100 / total.max(1);
            if percent >= next_report {
                info!("Encoding documents: {}% ({}/{})", percent, vectors.len(), total);
                next_report = (percent / 10 + 1) * 10;
            }
        }

        let stats = EncodeStats {
            encoded: vectors.len(),
            batches: total_batches,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Encoding complete: {} vectors in {}ms",
            stats.encoded, stats.duration_ms
        );

        Ok((vectors, stats))
    }
}
