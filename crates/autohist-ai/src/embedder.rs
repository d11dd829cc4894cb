//! ONNX Runtime sentence embedder (sentence-transformers export).
//!
//! Mean-pooled, L2-normalized embeddings. The model directory must contain
//! `model.onnx` and `tokenizer.json`; its name becomes part of the model
//! identity, so caches never mix vectors from different exports.

use std::path::Path;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use autohist_core::vector::normalize;

use crate::AiError;
use crate::provider::{BatchEmbedding, EmbeddingModel};

pub struct OnnxEmbedder {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
    identity: String,
}

fn onnx_err(e: impl std::fmt::Display) -> AiError {
    AiError::Embedding(e.to_string())
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, AiError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        for required in [&model_path, &tokenizer_path] {
            if !required.exists() {
                return Err(AiError::Embedding(format!(
                    "{} not found",
                    required.display()
                )));
            }
        }

        let session = Session::builder()
            .map_err(onnx_err)?
            .commit_from_file(&model_path)
            .map_err(onnx_err)?;

        let dim = infer_dim(session.outputs()[0].dtype()).unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| AiError::Embedding(format!("load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: 256,
                ..Default::default()
            }))
            .map_err(|e| AiError::Embedding(format!("set truncation: {e}")))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams::default()));

        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| model_dir.display().to_string());
        let identity = format!("onnx/{name}");

        info!(dim, model = %identity, "loaded embedding model");
        Ok(Self {
            session,
            tokenizer,
            dim,
            identity,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn run_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch_size = texts.len();
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| AiError::Embedding(format!("tokenize: {e}")))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        // [batch_size, seq_len], row-major.
        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];
        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[row + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[row + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[row + j] = tid as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let ids = Tensor::from_array((shape, input_ids.into_boxed_slice())).map_err(onnx_err)?;
        let mask = Tensor::from_array((shape, attention_mask.clone().into_boxed_slice()))
            .map_err(onnx_err)?;
        let types =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice())).map_err(onnx_err)?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask,
                "token_type_ids" => types,
            ])
            .map_err(onnx_err)?;

        // Token embeddings: [batch_size, seq_len, dim].
        let (output_shape, output_data) =
            outputs[0].try_extract_tensor::<f32>().map_err(onnx_err)?;
        let dims: &[i64] = output_shape;
        if dims.len() != 3 || dims[0] as usize != batch_size || dims[2] as usize != self.dim {
            return Err(AiError::Embedding(format!(
                "unexpected output shape {dims:?}, expected [{batch_size}, {seq_len}, {}]",
                self.dim
            )));
        }
        let out_seq_len = dims[1] as usize;

        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut pooled = vec![0.0f32; self.dim];
            let mut tokens = 0.0f32;
            for j in 0..out_seq_len {
                let m = attention_mask[i * seq_len + j] as f32;
                if m > 0.0 {
                    let offset = (i * out_seq_len + j) * self.dim;
                    for (d, p) in pooled.iter_mut().enumerate() {
                        *p += output_data[offset + d] * m;
                    }
                    tokens += m;
                }
            }
            if tokens > 0.0 {
                for p in &mut pooled {
                    *p /= tokens;
                }
            }
            normalize(&mut pooled);
            embeddings.push(pooled);
        }
        Ok(embeddings)
    }
}

impl EmbeddingModel for OnnxEmbedder {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>, AiError> {
        self.run_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| AiError::Embedding("model returned no embedding".into()))
    }

    fn as_batch(&mut self) -> Option<&mut dyn BatchEmbedding> {
        Some(self as &mut dyn BatchEmbedding)
    }
}

impl BatchEmbedding for OnnxEmbedder {
    fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        self.run_batch(texts)
    }
}

/// Last dimension of the model's first output, when static.
fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
