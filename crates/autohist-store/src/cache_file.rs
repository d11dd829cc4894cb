//! On-disk home of the embedding cache.
//!
//! The cache is one Arrow IPC blob: rows in least- to most-recently-used
//! order, model identity in the schema metadata. It is read fully at startup
//! and written only when the caller flushes.

use std::path::{Path, PathBuf};

use autohist_core::CacheSnapshot;
use tracing::info;

use crate::StoreError;
use crate::embeddings::{read_embeddings, write_embeddings};

pub const CACHE_FILENAME: &str = "cache.arrow";

pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    /// The cache blob inside `dir` (`<dir>/cache.arrow`).
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(CACHE_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot.
    ///
    /// A missing file yields an empty snapshot tagged with `live_identity`, so a
    /// first run starts clean. An existing file keeps its own declared identity;
    /// compatibility with the live model is checked by the cache's consumer.
    pub fn load(&self, live_identity: &str) -> Result<CacheSnapshot, StoreError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no embedding cache yet, starting empty");
            return Ok(CacheSnapshot::empty(live_identity));
        }

        let table = read_embeddings(&self.path)?;
        let model_identity = table.model_identity.ok_or_else(|| {
            StoreError::Schema(format!(
                "{} does not declare a model identity",
                self.path.display()
            ))
        })?;

        let mut snapshot = CacheSnapshot::empty(model_identity);
        snapshot.entries.extend(table.texts.into_iter().zip(table.vectors));
        info!(
            entries = snapshot.len(),
            model = %snapshot.model_identity,
            "loaded embedding cache"
        );
        Ok(snapshot)
    }

    /// Persist the full snapshot, replacing any previous blob.
    ///
    /// Writes to a sibling temp file first and renames it into place, so an
    /// interrupted flush leaves the previous cache intact.
    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("arrow.tmp");
        let texts: Vec<String> = snapshot.entries.keys().cloned().collect();
        let vectors: Vec<Vec<f32>> = snapshot.entries.values().cloned().collect();
        write_embeddings(&tmp, &texts, &vectors, Some(&snapshot.model_identity))?;
        std::fs::rename(&tmp, &self.path)?;

        info!(
            entries = snapshot.len(),
            path = %self.path.display(),
            "flushed embedding cache"
        );
        Ok(())
    }
}
