//! The pipeline output document written as `histograms.json`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entity::EntityIndex;

/// Label → entities under that label, most frequent first.
///
/// Insertion order is the order labels were first produced.
pub type Histogram = IndexMap<String, Vec<String>>;

/// JSON half of a pipeline run's output.
///
/// `descriptions_embs_order` and `entities_embs_order` are positionally aligned
/// with the two embedding tables persisted next to this document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramArtifact {
    pub histograms: Histogram,
    pub ids_by_entity: EntityIndex,
    pub descriptions_embs_order: Vec<String>,
    pub entities_embs_order: Vec<String>,
}

impl HistogramArtifact {
    /// Record ids containing `entity`; empty when the entity is unknown.
    pub fn ids_for(&self, entity: &str) -> &[usize] {
        self.ids_by_entity
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Restrict the entity index to the given entities, keeping their order.
    pub fn ids_by_entity_for<'a, I>(&self, entities: I) -> EntityIndex
    where
        I: IntoIterator<Item = &'a str>,
    {
        entities
            .into_iter()
            .filter_map(|e| {
                self.ids_by_entity
                    .get(e)
                    .map(|ids| (e.to_string(), ids.clone()))
            })
            .collect()
    }
}
