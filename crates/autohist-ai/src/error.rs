use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    /// The persisted cache was produced by a different embedding model.
    #[error("embedding cache belongs to model '{cached}', but the live model is '{live}'")]
    ModelMismatch { cached: String, live: String },

    /// Recomputing a cached sample with the live model gave a different vector.
    #[error("cached embedding for {text:?} does not match the live model's output")]
    CacheSampleMismatch { text: String },

    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("embedding model error: {0}")]
    Embedding(String),

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "http")]
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}
