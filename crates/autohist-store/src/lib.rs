//! Storage layer: Parquet record input, Arrow IPC embedding tables, JSON artifacts.

mod artifact;
mod cache_file;
mod embeddings;
mod error;
mod records;

pub use artifact::{
    ArtifactDir, DESCRIPTION_EMBEDDINGS_FILENAME, ENTITY_EMBEDDINGS_FILENAME,
    HISTOGRAMS_FILENAME,
};
pub use cache_file::{CACHE_FILENAME, CacheFile};
pub use embeddings::{EmbeddingTable, read_embeddings, write_embeddings};
pub use error::StoreError;
pub use records::{entity_lists, read_parquet, read_records};
