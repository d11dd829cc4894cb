//! Record input: one entity list per row, read from a Parquet table.
//!
//! The entity column is produced by an external extractor and must be a
//! `List<Utf8>` (or any List/LargeList of Utf8/LargeUtf8). Row position is the
//! record id used by the entity index.

use std::path::Path;

use arrow::array::{Array, LargeListArray, LargeStringArray, ListArray, StringArray};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use crate::StoreError;

/// Read a Parquet file into Arrow RecordBatches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Read the entity lists for every record in a Parquet file.
///
/// The column is checked against the file schema before any rows are decoded,
/// so a missing column fails even for an empty table.
pub fn read_records(path: &Path, column: &str) -> Result<Vec<Vec<String>>, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    check_entity_column(builder.schema(), column)?;

    let batches: Result<Vec<RecordBatch>, _> = builder.build()?.collect();
    let records = entity_lists(&batches?, column)?;
    info!(records = records.len(), column, path = %path.display(), "read records");
    Ok(records)
}

/// Extract the entity list column from record batches, one list per row.
///
/// Null rows become empty lists; null items inside a list are skipped.
pub fn entity_lists(batches: &[RecordBatch], column: &str) -> Result<Vec<Vec<String>>, StoreError> {
    let mut records = Vec::new();
    for batch in batches {
        check_entity_column(&batch.schema(), column)?;
        let col = batch
            .column_by_name(column)
            .ok_or_else(|| column_not_found(&batch.schema(), column))?;

        for row in 0..batch.num_rows() {
            records.push(get_string_list(col.as_ref(), row).unwrap_or_default());
        }
    }
    Ok(records)
}

fn check_entity_column(schema: &Schema, column: &str) -> Result<(), StoreError> {
    let field = schema
        .field_with_name(column)
        .map_err(|_| column_not_found(schema, column))?;

    let item_type = match field.data_type() {
        DataType::List(item) | DataType::LargeList(item) => item.data_type(),
        other => {
            return Err(StoreError::ColumnType {
                column: column.to_string(),
                found: other.to_string(),
            });
        }
    };
    if !matches!(item_type, DataType::Utf8 | DataType::LargeUtf8) {
        return Err(StoreError::ColumnType {
            column: column.to_string(),
            found: field.data_type().to_string(),
        });
    }
    Ok(())
}

fn column_not_found(schema: &Schema, column: &str) -> StoreError {
    StoreError::ColumnNotFound {
        column: column.to_string(),
        available: schema.fields().iter().map(|f| f.name().clone()).collect(),
    }
}

// ── Arrow extraction helpers ──

/// Extract a list of strings from a List or LargeList column.
fn get_string_list(col: &dyn Array, row: usize) -> Option<Vec<String>> {
    if col.is_null(row) {
        return None;
    }

    if let Some(list) = col.as_any().downcast_ref::<ListArray>() {
        return Some(strings_from_array(list.value(row).as_ref()));
    }
    if let Some(list) = col.as_any().downcast_ref::<LargeListArray>() {
        return Some(strings_from_array(list.value(row).as_ref()));
    }

    None
}

fn strings_from_array(arr: &dyn Array) -> Vec<String> {
    if let Some(a) = arr.as_any().downcast_ref::<StringArray>() {
        a.iter().flatten().map(str::to_string).collect()
    } else if let Some(a) = arr.as_any().downcast_ref::<LargeStringArray>() {
        a.iter().flatten().map(str::to_string).collect()
    } else {
        Vec::new()
    }
}
