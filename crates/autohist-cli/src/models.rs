//! Model selection from command-line flags and environment.

use std::path::PathBuf;

use anyhow::Context;
use autohist_ai::http::{ApiConfig, DEFAULT_BASE_URL, HttpEmbedder, HttpLanguageModel};
use autohist_ai::{EmbeddingModel, RateLimited};
use autohist_core::HistogramConfig;
use autohist_store::CacheFile;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// OpenAI-compatible API base URL
    #[arg(long, env = "AUTOHIST_API_BASE", default_value = DEFAULT_BASE_URL)]
    pub api_base: String,

    /// API key sent as a bearer token
    #[arg(long, env = "AUTOHIST_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat model used for labels and exemplars
    #[arg(long, default_value = "gpt-4o-mini")]
    pub chat_model: String,

    /// Remote embedding model
    #[arg(long, default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    /// Local ONNX model directory (model.onnx + tokenizer.json); replaces the
    /// remote embedding model. Needs the `onnx` feature.
    #[arg(long)]
    pub onnx_model: Option<PathBuf>,

    /// Embedding cache directory [default: <tmp>/autohist]
    #[arg(long, env = "AUTOHIST_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

impl ModelArgs {
    fn api(&self) -> ApiConfig {
        ApiConfig::new(&self.api_base, self.api_key.clone())
    }

    pub fn cache_file(&self) -> CacheFile {
        let dir = self
            .cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("autohist"));
        CacheFile::in_dir(&dir)
    }

    pub fn embedder(&self) -> anyhow::Result<Box<dyn EmbeddingModel>> {
        if let Some(dir) = &self.onnx_model {
            return onnx_embedder(dir);
        }
        let embedder = HttpEmbedder::new(self.api(), &self.embedding_model)
            .context("creating embedding client")?;
        Ok(Box::new(embedder))
    }

    pub fn language_model(
        &self,
        config: &HistogramConfig,
    ) -> anyhow::Result<RateLimited<HttpLanguageModel>> {
        let llm = HttpLanguageModel::new(self.api(), &self.chat_model)
            .context("creating language model client")?;
        Ok(RateLimited::from_config(llm, config)?)
    }
}

#[cfg(feature = "onnx")]
fn onnx_embedder(dir: &std::path::Path) -> anyhow::Result<Box<dyn EmbeddingModel>> {
    let embedder = autohist_ai::OnnxEmbedder::load(dir)
        .with_context(|| format!("loading ONNX model from {}", dir.display()))?;
    Ok(Box::new(embedder))
}

#[cfg(not(feature = "onnx"))]
fn onnx_embedder(dir: &std::path::Path) -> anyhow::Result<Box<dyn EmbeddingModel>> {
    anyhow::bail!(
        "--onnx-model {} given, but autohist was built without the `onnx` feature",
        dir.display()
    )
}
