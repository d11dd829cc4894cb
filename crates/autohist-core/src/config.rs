//! Tunables for clustering, labeling, classification, and the embedding cache.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config value {name}: {message}")]
    Invalid {
        name: &'static str,
        message: String,
    },
}

/// Pipeline configuration. Every field has a default, so a partial JSON
/// document (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    /// Entity universe cap applied before any O(n²) work.
    pub top_k_entities: usize,
    /// Smallest candidate cluster kept from the linkage tree.
    pub min_cluster_size: usize,
    /// Largest candidate cluster kept from the linkage tree.
    pub max_cluster_size: usize,
    /// Centroid cosine distance below which two candidates are merged.
    pub merge_threshold: f32,
    /// How many of a cluster's most frequent members are sent for labeling.
    pub label_top_n: usize,
    /// Embedding cache capacity (entries).
    pub cache_capacity: usize,
    /// Neighbors fetched from the nearest-neighbor index per query.
    pub neighbors: usize,
    /// Description search keeps hits strictly closer than this.
    pub search_cutoff: f32,
    /// Exemplar classification strictness in (0, 1]; higher is stricter.
    pub entity_label_confidence: f32,
    /// Language model quota: calls allowed per period.
    pub llm_calls_per_period: u32,
    /// Language model quota period, in seconds.
    pub llm_period_secs: u64,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            top_k_entities: 2000,
            min_cluster_size: 3,
            max_cluster_size: 15,
            merge_threshold: 0.05,
            label_top_n: 15,
            cache_capacity: 50_000,
            neighbors: 20,
            search_cutoff: 0.5,
            entity_label_confidence: 0.7,
            llm_calls_per_period: 80,
            llm_period_secs: 120,
        }
    }
}

impl HistogramConfig {
    /// Load from a JSON file, filling unspecified fields with defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_cluster_size == 0 || self.min_cluster_size > self.max_cluster_size {
            return Err(invalid(
                "min_cluster_size",
                format!(
                    "must be in 1..={} (max_cluster_size), got {}",
                    self.max_cluster_size, self.min_cluster_size
                ),
            ));
        }
        if !(self.entity_label_confidence > 0.0 && self.entity_label_confidence <= 1.0) {
            return Err(invalid(
                "entity_label_confidence",
                format!("must be in (0, 1], got {}", self.entity_label_confidence),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(invalid("cache_capacity", "must be > 0".into()));
        }
        if self.neighbors == 0 {
            return Err(invalid("neighbors", "must be > 0".into()));
        }
        if self.label_top_n == 0 {
            return Err(invalid("label_top_n", "must be > 0".into()));
        }
        if self.llm_calls_per_period == 0 || self.llm_period_secs == 0 {
            return Err(invalid(
                "llm_calls_per_period",
                "rate limit calls and period must both be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, message: String) -> ConfigError {
    ConfigError::Invalid { name, message }
}
