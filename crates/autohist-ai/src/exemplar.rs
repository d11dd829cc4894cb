//! Classifying an arbitrary category against the existing entity universe.
//!
//! The language model proposes exemplars for the category. Their centroid and
//! spread define a ball in embedding space; universe entities inside the ball,
//! nearest first, are the category's members. No reclustering is involved.

use std::collections::HashSet;

use autohist_core::HistogramConfig;
use autohist_core::vector::{euclidean, mean};
use tracing::{info, warn};

use crate::AiError;
use crate::llm::LanguageModel;
use crate::neighbors::{Neighbor, NearestNeighbors};
use crate::provider::{EmbeddingModel, EmbeddingProvider};

/// Inclusion radius for exemplars at the given centroid distances:
/// `max(d) * (2 - confidence)`. Confidence 1 gives exactly the exemplar spread.
pub fn inclusion_radius(exemplar_distances: &[f32], confidence: f32) -> f32 {
    let spread = exemplar_distances.iter().copied().fold(0.0f32, f32::max);
    spread * (2.0 - confidence)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub entity: String,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: String,
    pub exemplars: Vec<String>,
    pub radius: f32,
    /// Closest first.
    pub matches: Vec<Match>,
}

impl Classification {
    pub fn entities(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.entity.as_str()).collect()
    }
}

pub struct ExemplarClassifier {
    entities: Vec<String>,
    index: NearestNeighbors,
    neighbors: usize,
    confidence: f32,
}

impl ExemplarClassifier {
    /// Index precomputed universe embeddings. Duplicate entities keep their
    /// first occurrence.
    pub fn from_embeddings(
        entities: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        config: &HistogramConfig,
    ) -> Result<Self, AiError> {
        if entities.len() != embeddings.len() {
            return Err(AiError::InvalidParameter {
                name: "embeddings",
                message: format!(
                    "{} entities but {} embeddings",
                    entities.len(),
                    embeddings.len()
                ),
            });
        }
        let confidence = config.entity_label_confidence;
        if !(confidence > 0.0 && confidence <= 1.0) {
            return Err(AiError::InvalidParameter {
                name: "entity_label_confidence",
                message: format!("must be in (0, 1], got {confidence}"),
            });
        }

        let mut seen = HashSet::new();
        let (entities, embeddings): (Vec<String>, Vec<Vec<f32>>) = entities
            .into_iter()
            .zip(embeddings)
            .filter(|(e, _)| seen.insert(e.clone()))
            .unzip();

        Ok(Self {
            entities,
            index: NearestNeighbors::new(embeddings)?,
            neighbors: config.neighbors,
            confidence,
        })
    }

    /// Embed the universe through `provider` and index it.
    pub fn build<M: EmbeddingModel>(
        provider: &mut EmbeddingProvider<M>,
        universe: &[String],
        config: &HistogramConfig,
    ) -> Result<Self, AiError> {
        let mut seen = HashSet::new();
        let entities: Vec<String> = universe
            .iter()
            .filter(|e| seen.insert(e.as_str()))
            .cloned()
            .collect();
        let embeddings = provider.embed_all(&entities)?;
        Self::from_embeddings(entities, embeddings, config)
    }

    pub fn universe(&self) -> &[String] {
        &self.entities
    }

    /// Entities of the universe that belong to `category`.
    ///
    /// Neighbors of the exemplar centroid are walked closest first and
    /// accepted while within the inclusion radius; the walk stops at the
    /// first one outside it.
    pub fn classify<M, L>(
        &self,
        category: &str,
        llm: &mut L,
        provider: &mut EmbeddingProvider<M>,
    ) -> Result<Classification, AiError>
    where
        M: EmbeddingModel,
        L: LanguageModel + ?Sized,
    {
        let exemplars = llm.exemplars(category)?;
        let mut result = Classification {
            category: category.to_string(),
            exemplars,
            radius: 0.0,
            matches: Vec::new(),
        };
        if result.exemplars.is_empty() {
            warn!(category, "language model gave no exemplars");
            return Ok(result);
        }

        let vectors = provider.embed_all(&result.exemplars)?;
        let Some(centroid) = mean(vectors.iter().map(Vec::as_slice)) else {
            return Ok(result);
        };
        let distances: Vec<f32> = vectors.iter().map(|v| euclidean(v, &centroid)).collect();
        let radius = inclusion_radius(&distances, self.confidence);
        result.radius = radius;

        let k = self.neighbors.min(self.entities.len());
        result.matches = self
            .index
            .query(&centroid, k)?
            .into_iter()
            .take_while(|n| n.distance <= radius)
            .map(|Neighbor { index, distance }| Match {
                entity: self.entities[index].clone(),
                distance,
            })
            .collect();

        info!(
            category,
            exemplars = result.exemplars.len(),
            radius = result.radius,
            matches = result.matches.len(),
            "classified category"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EmbeddingCache;
    use crate::testing::{MockEmbedder, MockLanguageModel, animal_vectors, entities};

    fn provider() -> EmbeddingProvider<MockEmbedder> {
        EmbeddingProvider::new(
            MockEmbedder::new(animal_vectors()),
            EmbeddingCache::new("test-model", 100),
        )
        .unwrap()
    }

    #[test]
    fn radius_rule() {
        let d = [0.1, 0.4, 0.2];
        assert!((inclusion_radius(&d, 1.0) - 0.4).abs() < 1e-6);
        assert!((inclusion_radius(&d, 0.5) - 0.6).abs() < 1e-6);
        assert_eq!(inclusion_radius(&[], 0.7), 0.0);
    }

    #[test]
    fn classifies_animals_closest_first() {
        let mut provider = provider();
        let config = HistogramConfig::default();
        let classifier = ExemplarClassifier::build(&mut provider, &entities(), &config).unwrap();
        let mut llm = MockLanguageModel::with_exemplars("animals", &["lion", "tiger", "bear"]);

        let result = classifier.classify("animals", &mut llm, &mut provider).unwrap();

        assert_eq!(result.entities(), vec!["cat", "dog", "wolf"]);
        assert!(result.matches.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(result.radius > 0.2 && result.radius < 0.3);
    }

    #[test]
    fn stricter_confidence_narrows_matches() {
        let mut provider = provider();
        let config = HistogramConfig {
            entity_label_confidence: 1.0,
            ..Default::default()
        };
        let classifier = ExemplarClassifier::build(&mut provider, &entities(), &config).unwrap();
        let mut llm = MockLanguageModel::with_exemplars("animals", &["lion", "tiger", "bear"]);

        // Radius equals the exemplar spread (~0.19); wolf sits at ~0.16.
        let result = classifier.classify("animals", &mut llm, &mut provider).unwrap();
        assert_eq!(result.entities(), vec!["cat", "dog", "wolf"]);

        // Exemplars centred on cat with a small spread (~0.04); dog is ~0.07 away.
        let tight = [("lion", [1.0, 0.08, 0.08, 0.0]), ("tiger", [1.0, 0.02, 0.02, 0.0])];
        let mut vectors = animal_vectors();
        for (name, v) in tight {
            vectors.insert(name.to_string(), v.to_vec());
        }
        let mut provider = EmbeddingProvider::new(
            MockEmbedder::new(vectors),
            EmbeddingCache::new("test-model", 100),
        )
        .unwrap();
        let classifier = ExemplarClassifier::build(&mut provider, &entities(), &config).unwrap();
        let mut llm = MockLanguageModel::with_exemplars("cats", &["lion", "tiger"]);
        let result = classifier.classify("cats", &mut llm, &mut provider).unwrap();
        assert_eq!(result.entities(), vec!["cat"]);
    }

    #[test]
    fn no_exemplars_means_no_matches() {
        let mut provider = provider();
        let classifier =
            ExemplarClassifier::build(&mut provider, &entities(), &HistogramConfig::default())
                .unwrap();
        let mut llm = MockLanguageModel::default();
        let result = classifier.classify("planets", &mut llm, &mut provider).unwrap();
        assert!(result.matches.is_empty());
    }

    #[test]
    fn universe_is_deduplicated() {
        let mut provider = provider();
        let mut universe = entities();
        universe.push("cat".into());
        let classifier =
            ExemplarClassifier::build(&mut provider, &universe, &HistogramConfig::default())
                .unwrap();
        assert_eq!(classifier.universe().len(), 7);
    }
}
