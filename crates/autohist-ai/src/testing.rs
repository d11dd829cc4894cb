//! In-crate test doubles and the seven-entity fixture.

use std::collections::HashMap;

use crate::AiError;
use crate::llm::{LanguageModel, NO_LABEL};
use crate::provider::{BatchEmbedding, EmbeddingModel};

pub const ENTITIES: [&str; 7] = ["cat", "dog", "wolf", "monday", "tuesday", "wednesday", "7"];

/// Animals near the first axis, weekdays near the second, "7" on its own.
pub fn animal_vectors() -> HashMap<String, Vec<f32>> {
    [
        ("cat", [1.0, 0.05, 0.05, 0.0]),
        ("dog", [1.0, 0.1, 0.0, 0.0]),
        ("wolf", [0.9, 0.15, 0.0, 0.0]),
        ("monday", [0.0, 1.0, 0.0, 0.1]),
        ("tuesday", [0.1, 1.0, 0.0, 0.0]),
        ("wednesday", [0.0, 1.0, 0.1, 0.0]),
        ("7", [0.0, 0.0, 0.0, 1.0]),
        ("lion", [1.0, 0.2, 0.0, 0.0]),
        ("tiger", [1.0, 0.0, 0.2, 0.0]),
        ("bear", [1.0, -0.1, -0.1, 0.0]),
        ("animals", [1.0, 0.1, 0.05, 0.0]),
        ("weekdays", [0.05, 1.0, 0.05, 0.05]),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_vec()))
    .collect()
}

pub fn entities() -> Vec<String> {
    ENTITIES.iter().map(|s| s.to_string()).collect()
}

pub struct MockEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    batch: bool,
    pub calls: usize,
    pub batch_calls: usize,
}

impl MockEmbedder {
    pub fn new(vectors: HashMap<String, Vec<f32>>) -> Self {
        Self {
            vectors,
            batch: false,
            calls: 0,
            batch_calls: 0,
        }
    }

    pub fn with_batch(mut self) -> Self {
        self.batch = true;
        self
    }

    fn lookup(&self, text: &str) -> Result<Vec<f32>, AiError> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| AiError::Embedding(format!("no fixture vector for {text:?}")))
    }
}

impl EmbeddingModel for MockEmbedder {
    fn identity(&self) -> &str {
        "test-model"
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, AiError> {
        self.calls += 1;
        self.lookup(text)
    }

    fn as_batch(&mut self) -> Option<&mut dyn BatchEmbedding> {
        if self.batch {
            Some(self as &mut dyn BatchEmbedding)
        } else {
            None
        }
    }
}

impl BatchEmbedding for MockEmbedder {
    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        self.batch_calls += 1;
        texts.iter().map(|t| self.lookup(t)).collect()
    }
}

/// Labels a group by the category all its members share, "none" otherwise.
/// Exemplars come from a fixed table.
#[derive(Default)]
pub struct MockLanguageModel {
    pub label_requests: Vec<Vec<String>>,
    pub exemplar_table: HashMap<String, Vec<String>>,
}

impl MockLanguageModel {
    pub fn with_exemplars(label: &str, exemplars: &[&str]) -> Self {
        let mut llm = Self::default();
        llm.exemplar_table.insert(
            label.to_string(),
            exemplars.iter().map(|s| s.to_string()).collect(),
        );
        llm
    }
}

fn category(entity: &str) -> &'static str {
    match entity {
        "cat" | "dog" | "wolf" => "animals",
        "monday" | "tuesday" | "wednesday" => "weekdays",
        _ => "none",
    }
}

impl LanguageModel for MockLanguageModel {
    fn call(&mut self, _prompt: &str) -> Result<String, AiError> {
        Ok(NO_LABEL.to_string())
    }

    fn label(&mut self, top_entities: &[&str]) -> Result<String, AiError> {
        self.label_requests
            .push(top_entities.iter().map(|s| s.to_string()).collect());
        let first = top_entities.first().map(|e| category(e)).unwrap_or("none");
        if top_entities.iter().all(|e| category(e) == first) {
            Ok(first.to_string())
        } else {
            Ok("none".to_string())
        }
    }

    fn exemplars(&mut self, label: &str) -> Result<Vec<String>, AiError> {
        Ok(self.exemplar_table.get(label).cloned().unwrap_or_default())
    }
}
