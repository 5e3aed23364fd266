//! Exact nearest-neighbor index over stored embeddings.

use ordered_float::OrderedFloat;
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::DistanceMetric;

/// An entry in the vector index.
#[derive(Debug, Clone)]
struct IndexEntry {
    id: u64,
    embedding: Embedding,
}

/// A ranked search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Caller-assigned identifier of the stored vector.
    pub id: u64,

    /// Distance to the query under the index metric.
    pub distance: f32,
}

/// Brute-force k-NN index.
///
/// Every stored vector is scored on each query, so results are exact. Hits are
/// ordered by ascending distance; equal distances fall back to ascending id,
/// which keeps results for a smaller `k` a prefix of those for a larger one.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
    metric: DistanceMetric,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` components.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            entries: Vec::new(),
            dimension,
            metric,
        }
    }

    /// Add an embedding under `id`.
    pub fn add(&mut self, id: u64, embedding: Embedding) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        self.entries.push(IndexEntry { id, embedding });
        debug!("Added embedding to index: {id}");
        Ok(())
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Return up to `k` nearest stored vectors to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(OrderedFloat<f32>, u64)> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let distance = self.metric.distance(query, &entry.embedding)?;
            scored.push((OrderedFloat(distance), entry.id));
        }

        scored.sort();
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, id)| Neighbor {
                id,
                distance: distance.0,
            })
            .collect())
    }
}
