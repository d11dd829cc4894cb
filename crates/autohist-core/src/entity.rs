//! Entity frequency counting, the top-K cap, and the entity → record index.
//!
//! Records arrive as one entity list per row (produced by an external
//! extractor). Row position is the record identifier.

use indexmap::IndexMap;
use tracing::debug;

/// Entity → occurrence count, in descending count order once capped.
pub type EntityCounts = IndexMap<String, usize>;

/// Entity → ids of the records that contain it, ascending.
pub type EntityIndex = IndexMap<String, Vec<usize>>;

/// Count every entity occurrence across records and keep the `k` most frequent.
///
/// Ties keep first-seen order, so the result is deterministic for a given input.
pub fn take_top_k(records: &[Vec<String>], k: usize) -> EntityCounts {
    let mut counts = EntityCounts::new();
    for entities in records {
        for entity in entities {
            *counts.entry(entity.clone()).or_insert(0) += 1;
        }
    }

    let distinct = counts.len();
    // IndexMap::sort_by is stable.
    counts.sort_by(|_, a, _, b| b.cmp(a));
    counts.truncate(k);
    debug!(distinct, kept = counts.len(), "capped entity universe");
    counts
}

/// Build the entity → record id index over every record.
///
/// A record listing the same entity twice contributes its id once.
pub fn build_entity_index(records: &[Vec<String>]) -> EntityIndex {
    let mut index = EntityIndex::new();
    for (id, entities) in records.iter().enumerate() {
        for entity in entities {
            let ids = index.entry(entity.clone()).or_default();
            if ids.last() != Some(&id) {
                ids.push(id);
            }
        }
    }
    index
}

/// Sort entities by descending frequency; ties by entity string ascending.
///
/// Entities absent from `counts` rank as zero.
pub fn sort_by_frequency(entities: &mut [String], counts: &EntityCounts) {
    entities.sort_by(|a, b| {
        let ca = counts.get(a).copied().unwrap_or(0);
        let cb = counts.get(b).copied().unwrap_or(0);
        cb.cmp(&ca).then_with(|| a.cmp(b))
    });
}
