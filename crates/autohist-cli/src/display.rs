//! Plain-text rendering of histograms and query results.

use autohist_ai::{Classification, SearchHit};
use autohist_core::{EntityIndex, HistogramArtifact};

const MAX_LIST_ITEMS: usize = 10;

/// One block per label: entities most frequent first, with record counts.
pub fn print_histograms(artifact: &HistogramArtifact) {
    if artifact.histograms.is_empty() {
        println!("(no histograms)");
        return;
    }
    for (label, entities) in &artifact.histograms {
        println!("── {label} ({}) ──", entities.len());
        for entity in entities.iter().take(MAX_LIST_ITEMS) {
            println!("  {:<26} {}", entity, artifact.ids_for(entity).len());
        }
        if entities.len() > MAX_LIST_ITEMS {
            println!("  ... and {} more", entities.len() - MAX_LIST_ITEMS);
        }
        println!();
    }
}

pub fn print_search_hits(query: &str, hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No histogram labels near '{query}'.");
        return;
    }
    for hit in hits {
        println!("  {:<26} {:.4}", hit.description, hit.distance);
    }
}

pub fn print_classification(classification: &Classification, ids: &EntityIndex) {
    println!(
        "── {} ({}) ──",
        classification.category,
        classification.matches.len()
    );
    println!(
        "  {:<26} {}",
        "exemplars",
        classification.exemplars.join(", ")
    );
    println!("  {:<26} {:.4}", "radius", classification.radius);
    if classification.matches.is_empty() {
        println!("  (no matching entities)");
        return;
    }
    for m in &classification.matches {
        let records = ids.get(&m.entity).map(Vec::len).unwrap_or(0);
        println!("  {:<26} {:.4}  {records} records", m.entity, m.distance);
    }
}
