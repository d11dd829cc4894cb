//! Nearest-neighbor search over histogram descriptions.

use autohist_core::HistogramConfig;
use tracing::debug;

use crate::AiError;
use crate::neighbors::NearestNeighbors;
use crate::provider::{EmbeddingModel, EmbeddingProvider};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub description: String,
    pub distance: f32,
}

pub struct DescriptionSearch {
    descriptions: Vec<String>,
    index: NearestNeighbors,
    neighbors: usize,
    cutoff: f32,
}

impl DescriptionSearch {
    /// `embeddings[i]` must belong to `descriptions[i]`.
    pub fn new(
        descriptions: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        config: &HistogramConfig,
    ) -> Result<Self, AiError> {
        if descriptions.len() != embeddings.len() {
            return Err(AiError::InvalidParameter {
                name: "embeddings",
                message: format!(
                    "{} descriptions but {} embeddings",
                    descriptions.len(),
                    embeddings.len()
                ),
            });
        }
        Ok(Self {
            descriptions,
            index: NearestNeighbors::new(embeddings)?,
            neighbors: config.neighbors,
            cutoff: config.search_cutoff,
        })
    }

    /// Descriptions strictly closer than the cutoff, closest first.
    pub fn search(&self, query_embedding: &[f32]) -> Result<Vec<SearchHit>, AiError> {
        let k = self.neighbors.min(self.descriptions.len());
        let hits: Vec<SearchHit> = self
            .index
            .query(query_embedding, k)?
            .into_iter()
            .filter(|n| n.distance < self.cutoff)
            .map(|n| SearchHit {
                description: self.descriptions[n.index].clone(),
                distance: n.distance,
            })
            .collect();
        debug!(hits = hits.len(), "description search");
        Ok(hits)
    }

    /// Embed `query` and search with it.
    pub fn search_text<M: EmbeddingModel>(
        &self,
        provider: &mut EmbeddingProvider<M>,
        query: &str,
    ) -> Result<Vec<SearchHit>, AiError> {
        let embedding = provider.embed(query)?;
        self.search(&embedding)
    }
}
