//! Persisted state of an embedding cache.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Cache contents plus the identity of the model that produced them.
///
/// `entries` is ordered least- to most-recently used; replaying it in order
/// rebuilds the same recency order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub entries: IndexMap<String, Vec<f32>>,
    pub model_identity: String,
}

impl CacheSnapshot {
    /// An empty snapshot tagged with `model_identity`.
    pub fn empty(model_identity: impl Into<String>) -> Self {
        Self {
            entries: IndexMap::new(),
            model_identity: model_identity.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector width, taken from the first entry.
    pub fn dim(&self) -> Option<usize> {
        self.entries.values().next().map(Vec::len)
    }
}
