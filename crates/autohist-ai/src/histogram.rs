//! End-to-end histogram construction from per-record entity lists.

use autohist_core::{EntityCounts, Histogram, HistogramConfig, take_top_k};
use tracing::info;

use crate::AiError;
use crate::cluster::ClusteringEngine;
use crate::labeling::LabelingEngine;
use crate::llm::LanguageModel;
use crate::provider::{EmbeddingModel, EmbeddingProvider};

/// The capped entity universe and its embeddings, aligned by position.
#[derive(Debug, Clone, Default)]
pub struct EntityUniverse {
    /// Most frequent first.
    pub entities: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub counts: EntityCounts,
}

impl EntityUniverse {
    /// Cap the entities to the `config.top_k_entities` most frequent and embed them.
    pub fn embed<M: EmbeddingModel>(
        records: &[Vec<String>],
        provider: &mut EmbeddingProvider<M>,
        config: &HistogramConfig,
    ) -> Result<Self, AiError> {
        let counts = take_top_k(records, config.top_k_entities);
        let entities: Vec<String> = counts.keys().cloned().collect();
        info!(
            records = records.len(),
            entities = entities.len(),
            "embedding entity universe"
        );
        let embeddings = provider.embed_all(&entities)?;
        Ok(Self {
            entities,
            embeddings,
            counts,
        })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Cluster the universe, merge near-duplicate clusters, and label them.
pub fn label_universe<L: LanguageModel + ?Sized>(
    universe: &EntityUniverse,
    llm: &mut L,
    config: &HistogramConfig,
) -> Result<Histogram, AiError> {
    let clusters = ClusteringEngine::from_config(config).cluster(&universe.embeddings)?;
    let named: Vec<Vec<String>> = clusters
        .iter()
        .map(|c| c.iter().map(|&i| universe.entities[i].clone()).collect())
        .collect();
    LabelingEngine::from_config(config).label_clusters(llm, &named, &universe.counts)
}

/// Both stages in one call.
pub fn make_histograms<M, L>(
    records: &[Vec<String>],
    provider: &mut EmbeddingProvider<M>,
    llm: &mut L,
    config: &HistogramConfig,
) -> Result<(EntityUniverse, Histogram), AiError>
where
    M: EmbeddingModel,
    L: LanguageModel + ?Sized,
{
    let universe = EntityUniverse::embed(records, provider, config)?;
    let histograms = label_universe(&universe, llm, config)?;
    Ok((universe, histograms))
}
