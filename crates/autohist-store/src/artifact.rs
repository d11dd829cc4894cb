//! Output directory of a pipeline run.
//!
//! ```text
//! <dir>/histograms.json               HistogramArtifact
//! <dir>/embeddings_description.arrow  one row per descriptions_embs_order entry
//! <dir>/embeddings_entities.arrow     one row per entities_embs_order entry
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use autohist_core::HistogramArtifact;
use tracing::info;

use crate::StoreError;
use crate::embeddings::{EmbeddingTable, read_embeddings, write_embeddings};

pub const HISTOGRAMS_FILENAME: &str = "histograms.json";
pub const DESCRIPTION_EMBEDDINGS_FILENAME: &str = "embeddings_description.arrow";
pub const ENTITY_EMBEDDINGS_FILENAME: &str = "embeddings_entities.arrow";

pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a complete artifact, replacing whatever the directory held.
    ///
    /// `description_embeddings` and `entity_embeddings` must align with the
    /// artifact's `descriptions_embs_order` and `entities_embs_order`.
    pub fn write(
        &self,
        artifact: &HistogramArtifact,
        description_embeddings: &[Vec<f32>],
        entity_embeddings: &[Vec<f32>],
        model_identity: &str,
    ) -> Result<(), StoreError> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        std::fs::create_dir_all(&self.root)?;

        let file = File::create(self.root.join(HISTOGRAMS_FILENAME))?;
        serde_json::to_writer_pretty(BufWriter::new(file), artifact)?;

        write_embeddings(
            &self.root.join(DESCRIPTION_EMBEDDINGS_FILENAME),
            &artifact.descriptions_embs_order,
            description_embeddings,
            Some(model_identity),
        )?;
        write_embeddings(
            &self.root.join(ENTITY_EMBEDDINGS_FILENAME),
            &artifact.entities_embs_order,
            entity_embeddings,
            Some(model_identity),
        )?;

        info!(
            histograms = artifact.histograms.len(),
            entities = artifact.entities_embs_order.len(),
            dir = %self.root.display(),
            "wrote artifact"
        );
        Ok(())
    }

    /// Read `histograms.json`.
    pub fn read_artifact(&self) -> Result<HistogramArtifact, StoreError> {
        let path = self.root.join(HISTOGRAMS_FILENAME);
        if !path.exists() {
            return Err(StoreError::NotFound(path));
        }
        let file = File::open(&path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Read the description embeddings, checked against `descriptions_embs_order`.
    pub fn read_description_embeddings(
        &self,
        artifact: &HistogramArtifact,
    ) -> Result<EmbeddingTable, StoreError> {
        self.read_aligned(
            DESCRIPTION_EMBEDDINGS_FILENAME,
            &artifact.descriptions_embs_order,
        )
    }

    /// Read the entity embeddings, checked against `entities_embs_order`.
    pub fn read_entity_embeddings(
        &self,
        artifact: &HistogramArtifact,
    ) -> Result<EmbeddingTable, StoreError> {
        self.read_aligned(ENTITY_EMBEDDINGS_FILENAME, &artifact.entities_embs_order)
    }

    fn read_aligned(&self, filename: &str, order: &[String]) -> Result<EmbeddingTable, StoreError> {
        let table = read_embeddings(&self.root.join(filename))?;
        if table.texts != order {
            return Err(StoreError::Schema(format!(
                "{filename} is out of step with {HISTOGRAMS_FILENAME} ({} rows vs {} names)",
                table.len(),
                order.len()
            )));
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autohist_core::{EntityIndex, Histogram};
    use tempfile::TempDir;

    fn artifact() -> HistogramArtifact {
        let mut histograms = Histogram::new();
        histograms.insert("animals".into(), vec!["dog".into(), "cat".into()]);
        let mut ids_by_entity = EntityIndex::new();
        ids_by_entity.insert("dog".into(), vec![0, 1]);
        ids_by_entity.insert("cat".into(), vec![1]);

        HistogramArtifact {
            histograms,
            ids_by_entity,
            descriptions_embs_order: vec!["animals".into()],
            entities_embs_order: vec!["dog".into(), "cat".into()],
        }
    }

    #[test]
    fn write_then_read_back() {
        let tmp = TempDir::new().unwrap();
        let dir = ArtifactDir::new(tmp.path().join("out"));
        let original = artifact();

        dir.write(&original, &[vec![0.5, 0.5]], &[vec![1.0, 0.0], vec![0.9, 0.1]], "model-a")
            .unwrap();

        let loaded = dir.read_artifact().unwrap();
        assert_eq!(loaded, original);

        let descs = dir.read_description_embeddings(&loaded).unwrap();
        assert_eq!(descs.vectors, vec![vec![0.5, 0.5]]);
        assert_eq!(descs.model_identity.as_deref(), Some("model-a"));

        let ents = dir.read_entity_embeddings(&loaded).unwrap();
        assert_eq!(ents.texts, vec!["dog", "cat"]);
    }

    #[test]
    fn write_replaces_stale_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("out");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("stale.txt"), "old run").unwrap();

        let dir = ArtifactDir::new(&root);
        dir.write(&artifact(), &[vec![1.0]], &[vec![1.0], vec![0.5]], "model-a")
            .unwrap();
        assert!(!root.join("stale.txt").exists());
        assert!(root.join(HISTOGRAMS_FILENAME).exists());
    }

    #[test]
    fn detects_misaligned_embeddings() {
        let tmp = TempDir::new().unwrap();
        let dir = ArtifactDir::new(tmp.path().join("out"));
        dir.write(&artifact(), &[vec![1.0]], &[vec![1.0], vec![0.5]], "model-a")
            .unwrap();

        let mut edited = dir.read_artifact().unwrap();
        edited.entities_embs_order.reverse();
        let result = dir.read_entity_embeddings(&edited);
        assert!(matches!(result, Err(StoreError::Schema(_))));
    }

    #[test]
    fn missing_artifact_errors() {
        let tmp = TempDir::new().unwrap();
        let dir = ArtifactDir::new(tmp.path());
        assert!(matches!(dir.read_artifact(), Err(StoreError::NotFound(_))));
    }
}
