//! Least-recently-used embedding cache scoped to one model identity.
//!
//! Entries live in an `IndexMap` kept in recency order: index 0 is the least
//! recently used entry, the last index the most recent. Promotion moves an
//! entry to the back; eviction pops the front.

use autohist_core::CacheSnapshot;
use indexmap::IndexMap;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 50_000;

/// Single-writer cache; callers serialize access.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    entries: IndexMap<String, Vec<f32>>,
    capacity: usize,
    model_identity: String,
}

impl EmbeddingCache {
    pub fn new(model_identity: impl Into<String>, capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity,
            model_identity: model_identity.into(),
        }
    }

    /// Rebuild a cache from persisted state.
    ///
    /// Every entry is replayed through [`put`](Self::put) in snapshot order, so a
    /// snapshot larger than `capacity` keeps only its most recent entries.
    pub fn from_snapshot(snapshot: CacheSnapshot, capacity: usize) -> Self {
        let mut cache = Self::new(snapshot.model_identity, capacity);
        let loaded = snapshot.entries.len();
        for (text, vector) in snapshot.entries {
            cache.put(text, vector);
        }
        if loaded > cache.len() {
            debug!(
                loaded,
                kept = cache.len(),
                capacity,
                "snapshot exceeded cache capacity"
            );
        }
        cache
    }

    /// Look up `text`, promoting it to most recently used on a hit.
    pub fn get(&mut self, text: &str) -> Option<&[f32]> {
        let idx = self.entries.get_index_of(text)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        self.entries.get_index(last).map(|(_, v)| v.as_slice())
    }

    /// Look up `text` without touching recency order.
    pub fn peek(&self, text: &str) -> Option<&[f32]> {
        self.entries.get(text).map(Vec::as_slice)
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(text)
    }

    /// Insert or update `text` as most recently used.
    ///
    /// Returns the evicted key when the insert pushed the cache over capacity.
    pub fn put(&mut self, text: String, vector: Vec<f32>) -> Option<String> {
        let (idx, _) = self.entries.insert_full(text, vector);
        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);

        if self.entries.len() > self.capacity {
            return self.entries.shift_remove_index(0).map(|(key, _)| key);
        }
        None
    }

    /// The least recently used entry.
    pub fn oldest(&self) -> Option<(&str, &[f32])> {
        self.entries
            .first()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn model_identity(&self) -> &str {
        &self.model_identity
    }

    /// Copy of the current state, in recency order, ready to flush.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            entries: self.entries.clone(),
            model_identity: self.model_identity.clone(),
        }
    }

    pub fn into_snapshot(self) -> CacheSnapshot {
        CacheSnapshot {
            entries: self.entries,
            model_identity: self.model_identity,
        }
    }
}
