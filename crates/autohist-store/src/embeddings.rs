//! Arrow IPC files of `(text, embedding)` rows.
//!
//! Shared by the embedding cache blob and the artifact embedding arrays. The
//! producing model's identity travels in the schema metadata.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, FixedSizeListBuilder, Float32Array, Float32Builder, StringArray,
};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use autohist_core::schema::embeddings::{
    EMBEDDING_COLUMN, MODEL_IDENTITY_KEY, TEXT_COLUMN, embedding_schema,
    embedding_schema_for_model,
};

use crate::StoreError;

/// Decoded embedding table, rows in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingTable {
    pub texts: Vec<String>,
    pub vectors: Vec<Vec<f32>>,
    pub model_identity: Option<String>,
}

impl EmbeddingTable {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// Write `texts[i]` ↔ `vectors[i]` rows to an Arrow IPC file.
///
/// All vectors must share one width. An empty table is written as a schema
/// with no batches.
pub fn write_embeddings(
    path: &Path,
    texts: &[String],
    vectors: &[Vec<f32>],
    model_identity: Option<&str>,
) -> Result<(), StoreError> {
    if texts.len() != vectors.len() {
        return Err(StoreError::Schema(format!(
            "{} texts but {} vectors",
            texts.len(),
            vectors.len()
        )));
    }

    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(StoreError::Schema(format!(
            "vector {i} ({:?}) has width {}, expected {dim}",
            texts[i],
            v.len()
        )));
    }
    if dim == 0 && !vectors.is_empty() {
        return Err(StoreError::Schema("zero-width embeddings".into()));
    }

    let dim_i32 = i32::try_from(dim)
        .map_err(|_| StoreError::Schema(format!("embedding width {dim} too large")))?;
    let schema = Arc::new(match model_identity {
        Some(identity) => embedding_schema_for_model(dim_i32, identity),
        None => embedding_schema(dim_i32),
    });

    let file = File::create(path)?;
    let mut writer = FileWriter::try_new(file, &schema)?;

    if !texts.is_empty() {
        let mut emb_builder = FixedSizeListBuilder::new(Float32Builder::new(), dim_i32);
        for v in vectors {
            emb_builder.values().append_slice(v);
            emb_builder.append(true);
        }
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from_iter_values(texts)),
                Arc::new(emb_builder.finish()),
            ],
        )?;
        writer.write(&batch)?;
    }

    writer.finish()?;
    Ok(())
}

/// Read an embedding table written by [`write_embeddings`].
pub fn read_embeddings(path: &Path) -> Result<EmbeddingTable, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let reader = FileReader::try_new(File::open(path)?, None)?;
    let model_identity = reader.schema().metadata().get(MODEL_IDENTITY_KEY).cloned();

    let mut table = EmbeddingTable {
        model_identity,
        ..Default::default()
    };

    for batch in reader {
        let batch = batch?;
        let texts = batch
            .column_by_name(TEXT_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| StoreError::Schema(format!("missing Utf8 '{TEXT_COLUMN}' column")))?;
        let fsl = batch
            .column_by_name(EMBEDDING_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| {
                StoreError::Schema(format!("missing FixedSizeList '{EMBEDDING_COLUMN}' column"))
            })?;

        let dim = fsl.value_length() as usize;
        // The underlying values are a single flat Float32Array.
        let flat_values = fsl
            .values()
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| StoreError::Schema("embedding values are not Float32".into()))?;

        for row in 0..batch.num_rows() {
            if texts.is_null(row) || fsl.is_null(row) {
                continue;
            }
            let offset = fsl.value_offset(row) as usize;
            table.texts.push(texts.value(row).to_string());
            table
                .vectors
                .push(flat_values.values()[offset..offset + dim].to_vec());
        }
    }

    Ok(table)
}
