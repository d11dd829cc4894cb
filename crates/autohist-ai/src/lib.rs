//! Entity clustering and labeling engine.
//!
//! Embeddings come from an [`EmbeddingModel`] through a cache-backed
//! [`EmbeddingProvider`]; labels and exemplars come from a [`LanguageModel`].
//! Concrete models live behind the `onnx` and `http` features.

pub mod cache;
pub mod cluster;
mod error;
pub mod exemplar;
pub mod histogram;
pub mod labeling;
pub mod llm;
pub mod neighbors;
pub mod provider;
pub mod search;

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
mod testing;

pub use cache::{DEFAULT_CAPACITY, EmbeddingCache};
pub use cluster::{Cluster, ClusteringEngine, LinkageTree, Merge, merge_by_centroid};
#[cfg(feature = "onnx")]
pub use embedder::OnnxEmbedder;
pub use error::AiError;
pub use exemplar::{Classification, ExemplarClassifier, Match, inclusion_radius};
pub use histogram::{EntityUniverse, label_universe, make_histograms};
pub use labeling::LabelingEngine;
pub use llm::{LanguageModel, NO_LABEL, RateLimited};
pub use neighbors::{NearestNeighbors, Neighbor};
pub use provider::{BatchEmbedding, EmbeddingModel, EmbeddingProvider};
pub use search::{DescriptionSearch, SearchHit};
