use crate::error::{RagError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    InnerProduct,
    L2,
}

/// One search hit. `position` is the row in the index; a negative value means
/// the backend had no neighbour to fill that slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: i64,
    pub score: f32,
}

/// Nearest-neighbour lookup over stored vectors.
pub trait SimilaritySearch: Send + Sync {
    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns up to `k` neighbours ordered by descending score.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Exact (brute-force) index persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            vectors: Vec::new(),
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn add(&mut self, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(RagError::Validation(
                "vector has non-finite components".into(),
            ));
        }
        self.vectors.push(vector);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::index_load(path, "index file not found"));
        }
        let raw = fs::read(path).map_err(|e| RagError::index_load(path, e.to_string()))?;
        let index: FlatIndex = serde_json::from_slice(&raw)
            .map_err(|e| RagError::index_load(path, format!("corrupt index: {}", e)))?;

        if index.dimension == 0 {
            return Err(RagError::index_load(path, "index dimension is zero"));
        }
        if index.vectors.is_empty() {
            return Err(RagError::index_load(path, "index is empty"));
        }
        if let Some((row, v)) = index
            .vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != index.dimension)
        {
            return Err(RagError::index_load(
                path,
                format!(
                    "vector {} has {} dimensions, expected {}",
                    row,
                    v.len(),
                    index.dimension
                ),
            ));
        }
        if let Some(row) = index
            .vectors
            .iter()
            .position(|v| v.iter().any(|x| !x.is_finite()))
        {
            return Err(RagError::index_load(
                path,
                format!("vector {} has non-finite components", row),
            ));
        }

        log::info!(
            "Loaded index with {} vectors ({} dimensions, {:?})",
            index.vectors.len(),
            index.dimension,
            index.metric
        );
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_vec(self)
            .map_err(|e| RagError::index_load(path, format!("failed to serialize index: {}", e)))?;
        fs::write(path, raw).map_err(|e| RagError::index_load(path, e.to_string()))
    }

    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            Metric::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
            Metric::L2 => -a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>(),
        }
    }
}

impl SimilaritySearch for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(RagError::Validation(
                "query vector has non-finite components".into(),
            ));
        }

        let mut scored: Vec<Neighbor> = self
            .vectors
            .par_iter()
            .enumerate()
            .map(|(position, vector)| {
                // Overflowing products can still produce NaN; rank those last.
                let score = self.score(query, vector);
                Neighbor {
                    position: position as i64,
                    score: if score.is_nan() { f32::NEG_INFINITY } else { score },
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.position.cmp(&b.position))
        });
        scored.truncate(k);
        Ok(scored)
    }
}
