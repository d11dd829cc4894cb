//! Naming clusters and folding same-named clusters into histogram buckets.

use std::collections::HashSet;

use autohist_core::{EntityCounts, Histogram, HistogramConfig, sort_by_frequency};
use tracing::{debug, info};

use crate::AiError;
use crate::llm::{LanguageModel, is_no_label};

#[derive(Debug, Clone, Copy)]
pub struct LabelingEngine {
    /// Most frequent members sent to the model per cluster.
    pub top_n: usize,
}

impl Default for LabelingEngine {
    fn default() -> Self {
        Self::from_config(&HistogramConfig::default())
    }
}

impl LabelingEngine {
    pub fn from_config(config: &HistogramConfig) -> Self {
        Self {
            top_n: config.label_top_n,
        }
    }

    /// Label every cluster and build the histogram.
    ///
    /// Clusters labeled empty or "none" are dropped. Clusters sharing a label
    /// are unioned into one bucket. Buckets come out deduplicated and sorted by
    /// descending frequency, in first-labeled order.
    pub fn label_clusters<L: LanguageModel + ?Sized>(
        &self,
        llm: &mut L,
        clusters: &[Vec<String>],
        counts: &EntityCounts,
    ) -> Result<Histogram, AiError> {
        let mut histogram = Histogram::new();
        let mut dropped = 0usize;

        for cluster in clusters.iter().filter(|c| !c.is_empty()) {
            let mut sorted = cluster.clone();
            sort_by_frequency(&mut sorted, counts);
            let top: Vec<&str> = sorted.iter().take(self.top_n).map(String::as_str).collect();

            let label = llm.label(&top)?;
            let label = label.trim();
            if is_no_label(label) {
                debug!(members = %top.join(", "), "no coherent label, dropping cluster");
                dropped += 1;
                continue;
            }
            debug!(label, size = cluster.len(), "labeled cluster");
            histogram
                .entry(label.to_string())
                .or_default()
                .extend(sorted);
        }

        for entities in histogram.values_mut() {
            let mut seen = HashSet::new();
            entities.retain(|e| seen.insert(e.clone()));
            sort_by_frequency(entities, counts);
        }

        info!(
            clusters = clusters.len(),
            labels = histogram.len(),
            dropped,
            "labeled clusters"
        );
        Ok(histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLanguageModel;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn counts(pairs: &[(&str, usize)]) -> EntityCounts {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn same_label_clusters_are_unioned() {
        let counts = counts(&[("dog", 5), ("cat", 3), ("wolf", 1)]);
        let clusters = vec![strings(&["wolf", "cat"]), strings(&["dog", "cat"])];
        let mut llm = MockLanguageModel::default();

        let histogram = LabelingEngine::default()
            .label_clusters(&mut llm, &clusters, &counts)
            .unwrap();

        assert_eq!(histogram.len(), 1);
        assert_eq!(histogram["animals"], vec!["dog", "cat", "wolf"]);
    }

    #[test]
    fn none_label_drops_cluster() {
        let counts = counts(&[("cat", 2), ("monday", 2), ("7", 1)]);
        let clusters = vec![
            strings(&["cat", "monday", "7"]),
            strings(&["monday", "tuesday"]),
        ];
        let mut llm = MockLanguageModel::default();

        let histogram = LabelingEngine::default()
            .label_clusters(&mut llm, &clusters, &counts)
            .unwrap();

        assert_eq!(histogram.keys().collect::<Vec<_>>(), vec!["weekdays"]);
        assert_eq!(histogram["weekdays"], vec!["monday", "tuesday"]);
    }

    #[test]
    fn only_top_n_members_are_sent() {
        let counts = counts(&[("cat", 4), ("dog", 3), ("wolf", 2)]);
        let clusters = vec![strings(&["wolf", "dog", "cat"])];
        let mut llm = MockLanguageModel::default();

        let histogram = LabelingEngine { top_n: 2 }
            .label_clusters(&mut llm, &clusters, &counts)
            .unwrap();

        assert_eq!(llm.label_requests, vec![strings(&["cat", "dog"])]);
        // The bucket still holds every member.
        assert_eq!(histogram["animals"].len(), 3);
    }

    struct Fixed(&'static str);

    impl LanguageModel for Fixed {
        fn call(&mut self, _prompt: &str) -> Result<String, AiError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn none_sentinel_is_case_insensitive() {
        let clusters = vec![strings(&["a", "b", "c"])];
        for reply in ["None", "NONE", "  ", ""] {
            let histogram = LabelingEngine::default()
                .label_clusters(&mut Fixed(reply), &clusters, &EntityCounts::new())
                .unwrap();
            assert!(histogram.is_empty(), "{reply:?} kept a cluster");
        }
    }
}
