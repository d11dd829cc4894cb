//! Exact nearest-neighbor index over a fixed set of embeddings.

use autohist_core::vector::euclidean;

use crate::AiError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Brute-force Euclidean index. Built once, queried many times.
#[derive(Debug, Clone)]
pub struct NearestNeighbors {
    points: Vec<Vec<f32>>,
    dim: usize,
}

impl NearestNeighbors {
    pub fn new(points: Vec<Vec<f32>>) -> Result<Self, AiError> {
        let dim = points.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = points.iter().find(|p| p.len() != dim) {
            return Err(AiError::DimensionMismatch {
                expected: dim,
                found: bad.len(),
            });
        }
        Ok(Self { points, dim })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Up to `k` points closest to `query`, ascending by distance; equal
    /// distances keep index order.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, AiError> {
        if self.points.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(AiError::DimensionMismatch {
                expected: self.dim,
                found: query.len(),
            });
        }

        let mut hits: Vec<Neighbor> = self
            .points
            .iter()
            .enumerate()
            .map(|(index, p)| Neighbor {
                index,
                distance: euclidean(query, p),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.index.cmp(&b.index)));
        hits.truncate(k.min(self.points.len()));
        Ok(hits)
    }
}
