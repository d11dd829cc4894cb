/// Arrow schema definitions for embedding tables.
///
/// One layout serves every persisted vector set: the embedding cache blob and
/// the two artifact arrays (descriptions and entities). Rows pair a text with
/// its vector, so positional alignment survives a round trip on its own.
pub mod embeddings {
    use std::collections::HashMap;
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};

    pub const TEXT_COLUMN: &str = "text";
    pub const EMBEDDING_COLUMN: &str = "embedding";

    /// Schema metadata key carrying the embedding model identity.
    pub const MODEL_IDENTITY_KEY: &str = "model_identity";

    /// Item field of the `FixedSizeList` embedding column.
    pub fn item_field() -> Arc<Field> {
        Arc::new(Field::new("item", DataType::Float32, true))
    }

    /// Schema for a `(text, embedding)` table with `dim`-wide vectors.
    pub fn embedding_schema(dim: i32) -> Schema {
        Schema::new(vec![
            Field::new(TEXT_COLUMN, DataType::Utf8, false),
            Field::new(
                EMBEDDING_COLUMN,
                DataType::FixedSizeList(item_field(), dim),
                false,
            ),
        ])
    }

    /// Same as [`embedding_schema`], tagged with the model that produced the vectors.
    pub fn embedding_schema_for_model(dim: i32, model_identity: &str) -> Schema {
        let metadata = HashMap::from([(
            MODEL_IDENTITY_KEY.to_string(),
            model_identity.to_string(),
        )]);
        embedding_schema(dim).with_metadata(metadata)
    }
}
