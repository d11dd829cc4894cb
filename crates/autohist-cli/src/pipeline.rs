//! Pipeline stages behind the subcommands.
//!
//! A run reads nothing but the entity lists and the cache, and writes the
//! artifact directory only after every stage has succeeded.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use autohist_ai::{
    Classification, DescriptionSearch, EmbeddingCache, EmbeddingModel, EmbeddingProvider,
    EntityUniverse, ExemplarClassifier, LanguageModel, SearchHit, label_universe,
};
use autohist_core::{EntityIndex, HistogramArtifact, HistogramConfig, build_entity_index};
use autohist_store::{ArtifactDir, CacheFile, EmbeddingTable};
use tracing::info;

pub struct RunStats {
    pub records: usize,
    pub entities: usize,
    pub histograms: usize,
    pub cached: usize,
    pub elapsed_secs: f64,
}

/// Load the persisted cache for `model` and check it against the live model.
pub fn open_provider<M: EmbeddingModel>(
    model: M,
    cache_file: &CacheFile,
    config: &HistogramConfig,
) -> anyhow::Result<EmbeddingProvider<M>> {
    let snapshot = cache_file
        .load(model.identity())
        .with_context(|| format!("loading embedding cache {}", cache_file.path().display()))?;
    let cache = EmbeddingCache::from_snapshot(snapshot, config.cache_capacity);
    EmbeddingProvider::new(model, cache).with_context(|| {
        format!(
            "embedding cache {} is not usable with this model; remove it or pick the model that built it",
            cache_file.path().display()
        )
    })
}

fn flush<M: EmbeddingModel>(
    provider: &EmbeddingProvider<M>,
    cache_file: &CacheFile,
) -> anyhow::Result<()> {
    cache_file
        .save(&provider.cache().snapshot())
        .context("flushing embedding cache")
}

/// Build histograms for `records` and write the artifact to `out`.
pub fn run_pipeline<M, L>(
    records: &[Vec<String>],
    model: M,
    llm: &mut L,
    cache_file: &CacheFile,
    out: &ArtifactDir,
    config: &HistogramConfig,
) -> anyhow::Result<RunStats>
where
    M: EmbeddingModel,
    L: LanguageModel + ?Sized,
{
    let start = Instant::now();
    let mut provider = open_provider(model, cache_file, config)?;

    let universe =
        EntityUniverse::embed(records, &mut provider, config).context("embedding entities")?;
    eprintln!("  Embedded {} entities", universe.len());
    flush(&provider, cache_file)?;

    let histograms =
        label_universe(&universe, llm, config).context("clustering and labeling entities")?;
    eprintln!("  Labeled {} histograms", histograms.len());

    let descriptions: Vec<String> = histograms.keys().cloned().collect();
    let description_embeddings = provider
        .embed_all(&descriptions)
        .context("embedding histogram labels")?;

    let artifact = HistogramArtifact {
        histograms,
        ids_by_entity: build_entity_index(records),
        descriptions_embs_order: descriptions,
        entities_embs_order: universe.entities.clone(),
    };
    out.write(
        &artifact,
        &description_embeddings,
        &universe.embeddings,
        provider.model_identity(),
    )
    .with_context(|| format!("writing artifact to {}", out.root().display()))?;
    flush(&provider, cache_file)?;

    let stats = RunStats {
        records: records.len(),
        entities: universe.len(),
        histograms: artifact.histograms.len(),
        cached: provider.cache().len(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    info!(
        records = stats.records,
        entities = stats.entities,
        histograms = stats.histograms,
        elapsed_secs = stats.elapsed_secs,
        "pipeline finished"
    );
    Ok(stats)
}

fn ensure_same_model<M: EmbeddingModel>(
    table: &EmbeddingTable,
    provider: &EmbeddingProvider<M>,
    what: &str,
) -> anyhow::Result<()> {
    match table.model_identity.as_deref() {
        Some(identity) if identity == provider.model_identity() => Ok(()),
        Some(identity) => anyhow::bail!(
            "{what} were embedded with '{identity}', but the live model is '{}'",
            provider.model_identity()
        ),
        None => anyhow::bail!("{what} do not record which model embedded them"),
    }
}

/// Classify a new category against an artifact's entity universe.
///
/// Returns the classification plus the records containing each match.
pub fn classify_category<M, L>(
    dir: &ArtifactDir,
    category: &str,
    provider: &mut EmbeddingProvider<M>,
    llm: &mut L,
    config: &HistogramConfig,
) -> anyhow::Result<(Classification, EntityIndex)>
where
    M: EmbeddingModel,
    L: LanguageModel + ?Sized,
{
    let artifact = dir.read_artifact().context("reading histograms")?;
    let table = dir
        .read_entity_embeddings(&artifact)
        .context("reading entity embeddings")?;
    ensure_same_model(&table, provider, "entities")?;

    let classifier = ExemplarClassifier::from_embeddings(table.texts, table.vectors, config)?;
    let classification = classifier
        .classify(category, llm, provider)
        .with_context(|| format!("classifying '{category}'"))?;
    let ids = artifact.ids_by_entity_for(classification.entities());
    Ok((classification, ids))
}

/// Histogram labels near `query`.
pub fn search_descriptions<M: EmbeddingModel>(
    dir: &ArtifactDir,
    query: &str,
    provider: &mut EmbeddingProvider<M>,
    config: &HistogramConfig,
) -> anyhow::Result<Vec<SearchHit>> {
    let artifact = dir.read_artifact().context("reading histograms")?;
    let table = dir
        .read_description_embeddings(&artifact)
        .context("reading description embeddings")?;
    ensure_same_model(&table, provider, "descriptions")?;

    let search = DescriptionSearch::new(table.texts, table.vectors, config)?;
    Ok(search.search_text(provider, query)?)
}

/// Flush after a query command so new query embeddings are kept.
pub fn finish_query<M: EmbeddingModel>(
    provider: &EmbeddingProvider<M>,
    cache_file: &CacheFile,
) -> anyhow::Result<()> {
    flush(provider, cache_file)
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<HistogramConfig> {
    let config = match path {
        Some(path) => HistogramConfig::from_json_file(path)?,
        None => HistogramConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autohist_ai::AiError;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct FixtureEmbedder {
        vectors: HashMap<&'static str, [f32; 4]>,
        calls: Rc<Cell<usize>>,
    }

    impl FixtureEmbedder {
        fn new(calls: Rc<Cell<usize>>) -> Self {
            let vectors = HashMap::from([
                ("cat", [1.0, 0.05, 0.05, 0.0]),
                ("dog", [1.0, 0.1, 0.0, 0.0]),
                ("wolf", [0.9, 0.15, 0.0, 0.0]),
                ("monday", [0.0, 1.0, 0.0, 0.1]),
                ("tuesday", [0.1, 1.0, 0.0, 0.0]),
                ("wednesday", [0.0, 1.0, 0.1, 0.0]),
                ("7", [0.0, 0.0, 0.0, 1.0]),
                ("animals", [1.0, 0.1, 0.05, 0.0]),
                ("weekdays", [0.05, 1.0, 0.05, 0.05]),
                ("pets", [0.95, 0.1, 0.0, 0.0]),
                ("lion", [1.0, 0.2, 0.0, 0.0]),
                ("tiger", [1.0, 0.0, 0.2, 0.0]),
                ("bear", [1.0, -0.1, -0.1, 0.0]),
            ]);
            Self { vectors, calls }
        }
    }

    impl EmbeddingModel for FixtureEmbedder {
        fn identity(&self) -> &str {
            "fixture"
        }

        fn embed(&mut self, text: &str) -> Result<Vec<f32>, AiError> {
            self.calls.set(self.calls.get() + 1);
            self.vectors
                .get(text)
                .map(|v| v.to_vec())
                .ok_or_else(|| AiError::Embedding(format!("unknown text {text:?}")))
        }
    }

    struct CategoryLlm;

    impl LanguageModel for CategoryLlm {
        fn call(&mut self, _prompt: &str) -> Result<String, AiError> {
            Ok("none".into())
        }

        fn label(&mut self, top: &[&str]) -> Result<String, AiError> {
            let animals = ["cat", "dog", "wolf"];
            let weekdays = ["monday", "tuesday", "wednesday"];
            if top.iter().all(|e| animals.contains(e)) {
                Ok("animals".into())
            } else if top.iter().all(|e| weekdays.contains(e)) {
                Ok("weekdays".into())
            } else {
                Ok("none".into())
            }
        }

        fn exemplars(&mut self, _label: &str) -> Result<Vec<String>, AiError> {
            Ok(vec!["lion".into(), "tiger".into(), "bear".into()])
        }
    }

    fn records() -> Vec<Vec<String>> {
        let rows: &[&[&str]] = &[
            &["dog", "monday", "7"],
            &["dog", "cat", "tuesday"],
            &["dog", "wolf", "cat", "wednesday"],
            &["monday", "tuesday"],
            &[],
        ];
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    struct Workspace {
        _tmp: TempDir,
        cache: CacheFile,
        out: ArtifactDir,
    }

    fn workspace() -> Workspace {
        let tmp = TempDir::new().unwrap();
        let cache = CacheFile::in_dir(&tmp.path().join("cache"));
        let out = ArtifactDir::new(tmp.path().join("out"));
        Workspace {
            _tmp: tmp,
            cache,
            out,
        }
    }

    #[test]
    fn run_writes_artifact_and_cache() {
        let ws = workspace();
        let calls = Rc::new(Cell::new(0));
        let config = HistogramConfig::default();

        let stats = run_pipeline(
            &records(),
            FixtureEmbedder::new(calls.clone()),
            &mut CategoryLlm,
            &ws.cache,
            &ws.out,
            &config,
        )
        .unwrap();

        assert_eq!(stats.records, 5);
        assert_eq!(stats.entities, 7);
        assert_eq!(stats.histograms, 2);
        // Seven entities plus two labels.
        assert_eq!(calls.get(), 9);

        let artifact = ws.out.read_artifact().unwrap();
        assert_eq!(artifact.histograms["animals"], vec!["dog", "cat", "wolf"]);
        assert_eq!(artifact.ids_for("dog"), &[0, 1, 2]);
        assert_eq!(artifact.ids_for("tuesday"), &[1, 3]);
        assert_eq!(artifact.descriptions_embs_order, vec!["animals", "weekdays"]);
        let entities = ws.out.read_entity_embeddings(&artifact).unwrap();
        assert_eq!(entities.len(), 7);
        assert_eq!(entities.model_identity.as_deref(), Some("fixture"));

        let cached = ws.cache.load("fixture").unwrap();
        assert_eq!(cached.len(), 9);
    }

    #[test]
    fn second_run_is_served_from_cache() {
        let ws = workspace();
        let config = HistogramConfig::default();
        run_pipeline(
            &records(),
            FixtureEmbedder::new(Rc::new(Cell::new(0))),
            &mut CategoryLlm,
            &ws.cache,
            &ws.out,
            &config,
        )
        .unwrap();

        let calls = Rc::new(Cell::new(0));
        run_pipeline(
            &records(),
            FixtureEmbedder::new(calls.clone()),
            &mut CategoryLlm,
            &ws.cache,
            &ws.out,
            &config,
        )
        .unwrap();
        // Only the compatibility sample is recomputed.
        assert_eq!(calls.get(), 1);
    }

    struct OtherModel;

    impl EmbeddingModel for OtherModel {
        fn identity(&self) -> &str {
            "other"
        }

        fn embed(&mut self, _text: &str) -> Result<Vec<f32>, AiError> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
    }

    #[test]
    fn foreign_cache_aborts_without_artifact() {
        let ws = workspace();
        let mut snapshot = autohist_core::CacheSnapshot::empty("fixture");
        snapshot.entries.insert("cat".into(), vec![1.0, 0.0, 0.0, 0.0]);
        ws.cache.save(&snapshot).unwrap();

        let result = run_pipeline(
            &records(),
            OtherModel,
            &mut CategoryLlm,
            &ws.cache,
            &ws.out,
            &HistogramConfig::default(),
        );
        let err = result.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<AiError>(),
            Some(AiError::ModelMismatch { .. })
        ));
        assert!(!ws.out.root().exists());
    }

    #[test]
    fn classify_and_search_over_artifact() {
        let ws = workspace();
        let config = HistogramConfig::default();
        run_pipeline(
            &records(),
            FixtureEmbedder::new(Rc::new(Cell::new(0))),
            &mut CategoryLlm,
            &ws.cache,
            &ws.out,
            &config,
        )
        .unwrap();

        let mut provider =
            open_provider(FixtureEmbedder::new(Rc::new(Cell::new(0))), &ws.cache, &config)
                .unwrap();
        let (classification, ids) =
            classify_category(&ws.out, "animals", &mut provider, &mut CategoryLlm, &config)
                .unwrap();
        assert_eq!(classification.entities(), vec!["cat", "dog", "wolf"]);
        assert_eq!(ids["wolf"], vec![2]);

        let hits = search_descriptions(&ws.out, "pets", &mut provider, &config).unwrap();
        assert_eq!(hits[0].description, "animals");
        finish_query(&provider, &ws.cache).unwrap();
        assert!(ws.cache.load("fixture").unwrap().entries.contains_key("pets"));
    }

    #[test]
    fn default_config_without_file() {
        assert_eq!(load_config(None).unwrap(), HistogramConfig::default());
    }
}
