pub mod artifact;
pub mod config;
pub mod entity;
pub mod schema;
pub mod snapshot;
pub mod vector;

pub use artifact::{Histogram, HistogramArtifact};
pub use config::{ConfigError, HistogramConfig};
pub use entity::{EntityCounts, EntityIndex, build_entity_index, sort_by_frequency, take_top_k};
pub use schema::embeddings;
pub use snapshot::CacheSnapshot;
