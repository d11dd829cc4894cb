//! Cache-aware adapter around an external embedding model.
//!
//! Models implement [`EmbeddingModel`]. Models that can embed many texts in
//! one call also implement [`BatchEmbedding`] and expose it through
//! [`EmbeddingModel::as_batch`]; the provider asks for that capability up
//! front instead of probing for it by calling.

use tracing::{debug, info, warn};

use crate::AiError;
use crate::cache::EmbeddingCache;

/// Progress is logged every this many items on the sequential path.
const PROGRESS_EVERY: usize = 100;

pub trait EmbeddingModel {
    /// Stable name of the model configuration. Cached vectors are only valid
    /// for the identity that produced them.
    fn identity(&self) -> &str;

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, AiError>;

    /// The batch capability, if this model has one.
    fn as_batch(&mut self) -> Option<&mut dyn BatchEmbedding> {
        None
    }
}

pub trait BatchEmbedding {
    /// One vector per input text, in input order.
    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError>;
}

impl<M: EmbeddingModel + ?Sized> EmbeddingModel for Box<M> {
    fn identity(&self) -> &str {
        (**self).identity()
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, AiError> {
        (**self).embed(text)
    }

    fn as_batch(&mut self) -> Option<&mut dyn BatchEmbedding> {
        (**self).as_batch()
    }
}

pub struct EmbeddingProvider<M> {
    model: M,
    cache: EmbeddingCache,
}

impl<M: EmbeddingModel> EmbeddingProvider<M> {
    /// Pair a model with a loaded cache, checking that the cache belongs to it.
    ///
    /// The cache's declared identity must equal the model's. A non-empty cache
    /// must also reproduce: its oldest entry is recomputed live and has to
    /// match the stored vector exactly. Either failure is fatal; the cache is
    /// never rebuilt silently.
    pub fn new(mut model: M, cache: EmbeddingCache) -> Result<Self, AiError> {
        if cache.model_identity() != model.identity() {
            return Err(AiError::ModelMismatch {
                cached: cache.model_identity().to_string(),
                live: model.identity().to_string(),
            });
        }

        if let Some((text, cached)) = cache.oldest() {
            let live = model.embed(text)?;
            if live.as_slice() != cached {
                return Err(AiError::CacheSampleMismatch {
                    text: text.to_string(),
                });
            }
            debug!(sample = text, "cache sample matches live model");
        }

        info!(
            model = model.identity(),
            cached = cache.len(),
            capacity = cache.capacity(),
            "embedding provider ready"
        );
        Ok(Self { model, cache })
    }

    pub fn model_identity(&self) -> &str {
        self.model.identity()
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Embed one text, cache first.
    pub fn embed(&mut self, text: &str) -> Result<Vec<f32>, AiError> {
        if let Some(hit) = self.cache.get(text) {
            return Ok(hit.to_vec());
        }
        let vector = self.model.embed(text)?;
        if let Some(evicted) = self.cache.put(text.to_string(), vector.clone()) {
            debug!(evicted, "embedding cache full, evicted oldest entry");
        }
        Ok(vector)
    }

    /// Embed many texts.
    ///
    /// With a batch-capable model the whole list goes to the model in one call
    /// and the cache is bypassed. Otherwise each text goes through
    /// [`embed`](Self::embed) in order, with progress logged.
    pub fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        if let Some(batch) = self.model.as_batch() {
            debug!(count = texts.len(), "embedding with batch capability");
            let vectors = batch.embed_batch(texts)?;
            if vectors.len() != texts.len() {
                return Err(AiError::Embedding(format!(
                    "batch returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            return Ok(vectors);
        }

        let total = texts.len();
        info!(total, "model has no batch capability, embedding one at a time");
        let mut vectors = Vec::with_capacity(total);
        for (i, text) in texts.iter().enumerate() {
            vectors.push(self.embed(text)?);
            let done = i + 1;
            if done % PROGRESS_EVERY == 0 || done == total {
                info!(done, total, "embedding progress");
            }
        }
        Ok(vectors)
    }

    /// Embed every text and check that all vectors share one width.
    pub fn embed_all(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = self.embed_batch(&refs)?;
        if let Some(first) = vectors.first() {
            let expected = first.len();
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
                warn!(expected, found = bad.len(), "model returned ragged embeddings");
                return Err(AiError::DimensionMismatch {
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(vectors)
    }

    pub fn into_cache(self) -> EmbeddingCache {
        self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEmbedder, animal_vectors};

    fn provider(model: MockEmbedder) -> EmbeddingProvider<MockEmbedder> {
        let cache = EmbeddingCache::new(model.identity().to_string(), 100);
        EmbeddingProvider::new(model, cache).unwrap()
    }

    #[test]
    fn embed_hits_cache_second_time() {
        let mut p = provider(MockEmbedder::new(animal_vectors()));
        let first = p.embed("cat").unwrap();
        let second = p.embed("cat").unwrap();
        assert_eq!(first, second);
        assert_eq!(p.model.calls, 1);
        assert!(p.cache().contains("cat"));
    }

    #[test]
    fn identity_mismatch_is_fatal() {
        let model = MockEmbedder::new(animal_vectors());
        let cache = EmbeddingCache::new("another-model", 100);
        match EmbeddingProvider::new(model, cache) {
            Err(AiError::ModelMismatch { cached, live }) => {
                assert_eq!(cached, "another-model");
                assert_eq!(live, "test-model");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("mismatched cache accepted"),
        }
    }

    #[test]
    fn stale_sample_is_fatal() {
        let model = MockEmbedder::new(animal_vectors());
        let mut cache = EmbeddingCache::new("test-model", 100);
        cache.put("cat".into(), vec![0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            EmbeddingProvider::new(model, cache),
            Err(AiError::CacheSampleMismatch { text }) if text == "cat"
        ));
    }

    #[test]
    fn matching_sample_is_accepted() {
        let vectors = animal_vectors();
        let mut cache = EmbeddingCache::new("test-model", 100);
        cache.put("dog".into(), vectors["dog"].clone());
        let p = EmbeddingProvider::new(MockEmbedder::new(vectors), cache).unwrap();
        assert_eq!(p.model.calls, 1);
    }

    #[test]
    fn batch_capability_bypasses_cache() {
        let mut p = provider(MockEmbedder::new(animal_vectors()).with_batch());
        let out = p.embed_batch(&["cat", "dog"]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(p.model.batch_calls, 1);
        assert_eq!(p.model.calls, 0);
        assert!(p.cache().is_empty());
    }

    #[test]
    fn sequential_fallback_fills_cache() {
        let mut p = provider(MockEmbedder::new(animal_vectors()));
        let texts = vec!["cat".to_string(), "dog".into(), "cat".into()];
        let out = p.embed_all(&texts).unwrap();
        assert_eq!(out[0], out[2]);
        assert_eq!(p.model.calls, 2);
        assert_eq!(p.cache().len(), 2);
    }

    #[test]
    fn boxed_model_keeps_batch_capability() {
        let model: Box<dyn EmbeddingModel> = Box::new(MockEmbedder::new(animal_vectors()).with_batch());
        let cache = EmbeddingCache::new("test-model", 10);
        let mut p = EmbeddingProvider::new(model, cache).unwrap();
        p.embed_batch(&["cat"]).unwrap();
        assert!(p.cache().is_empty());
    }

    #[test]
    fn ragged_vectors_are_rejected() {
        let mut vectors = animal_vectors();
        vectors.insert("odd".into(), vec![1.0, 2.0]);
        let mut p = provider(MockEmbedder::new(vectors));
        let result = p.embed_all(&["cat".to_string(), "odd".into()]);
        assert!(matches!(
            result,
            Err(AiError::DimensionMismatch {
                expected: 4,
                found: 2
            })
        ));
    }
}
