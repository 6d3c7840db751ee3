use crate::codec;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::models::{ContentType, Embedding, Metadata, NewEmbedding};
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

/// Sea-ORM Entity for the embeddings table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "embeddings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub content_id: Uuid,
    pub content_type: ContentType,
    #[sea_orm(column_type = "Text")]
    pub content_text: String,
    // Bracketed literal, cast to pgvector's `vector` at query time
    #[sea_orm(column_type = "Text", nullable)]
    pub embedding_vector: Option<String>,
    pub embedding_model: String,
    pub chunk_index: i32,
    pub chunk_total: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// ActiveModel with every column set, suitable for INSERT
    pub fn into_insert(self) -> ActiveModel {
        ActiveModel {
            id: Set(self.id),
            content_id: Set(self.content_id),
            content_type: Set(self.content_type),
            content_text: Set(self.content_text),
            embedding_vector: Set(self.embedding_vector),
            embedding_model: Set(self.embedding_model),
            chunk_index: Set(self.chunk_index),
            chunk_total: Set(self.chunk_total),
            metadata: Set(self.metadata),
            created_at: Set(self.created_at),
            updated_at: Set(self.updated_at),
        }
    }
}

fn metadata_from_json(value: Json) -> Metadata {
    match value {
        Json::Object(map) => map,
        _ => Metadata::new(),
    }
}

fn to_embedding(model: Model, vector: Option<Vec<f32>>) -> Embedding {
    Embedding {
        id: model.id,
        content_id: model.content_id,
        content_type: model.content_type,
        content_text: model.content_text,
        embedding_vector: vector,
        embedding_model: model.embedding_model,
        chunk_index: u32::try_from(model.chunk_index).unwrap_or_default(),
        chunk_total: u32::try_from(model.chunk_total).unwrap_or_default(),
        metadata: metadata_from_json(model.metadata),
        created_at: model.created_at.into(),
        updated_at: model.updated_at.into(),
    }
}

// Lenient conversion: a malformed or empty stored vector is logged and exposed as absent
impl From<Model> for Embedding {
    fn from(model: Model) -> Self {
        let vector = match model.embedding_vector.as_deref().map(codec::decode) {
            Some(Ok(vector)) if !vector.is_empty() => Some(vector),
            Some(Ok(_)) => {
                tracing::warn!(embedding_id = %model.id, "Ignoring empty stored vector");
                None
            }
            Some(Err(err)) => {
                tracing::warn!(
                    embedding_id = %model.id,
                    error = %err,
                    "Ignoring malformed stored vector"
                );
                None
            }
            None => None,
        };
        to_embedding(model, vector)
    }
}

impl Embedding {
    /// Strict conversion used where the vector must be trustworthy (search results)
    pub fn try_from_model(model: Model) -> EmbeddingResult<Self> {
        let vector = model
            .embedding_vector
            .as_deref()
            .map(codec::decode)
            .transpose()
            .map_err(|source| EmbeddingError::Decode {
                id: model.id,
                source,
            })?;
        Ok(to_embedding(model, vector))
    }
}

fn to_column(field: &str, value: u32) -> EmbeddingResult<i32> {
    i32::try_from(value).map_err(|_| {
        EmbeddingError::Validation(format!("{field} {value} exceeds the storable range"))
    })
}

// New record: fresh v7 id, both timestamps set to now
impl TryFrom<NewEmbedding> for Model {
    type Error = EmbeddingError;

    fn try_from(input: NewEmbedding) -> EmbeddingResult<Self> {
        let now = chrono::Utc::now();
        let embedding_vector = input.encoded_vector();

        Ok(Model {
            id: Uuid::now_v7(),
            content_id: input.content_id,
            content_type: input.content_type,
            chunk_index: to_column("chunk_index", input.chunk_index)?,
            chunk_total: to_column("chunk_total", input.chunk_total)?,
            content_text: input.content_text,
            embedding_vector,
            embedding_model: input.embedding_model,
            metadata: Json::Object(input.metadata),
            created_at: now.into(),
            updated_at: now.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model_with_vector(vector: Option<&str>) -> Model {
        let input = NewEmbedding::new(Uuid::now_v7(), ContentType::CodeSnippet, "fn main() {}")
            .with_metadata("language", "rust");
        let mut model = Model::try_from(input).unwrap();
        model.embedding_vector = vector.map(str::to_string);
        model
    }

    #[test]
    fn test_new_embedding_into_model() {
        let content_id = Uuid::now_v7();
        let input = NewEmbedding::new(content_id, ContentType::Comment, "hi")
            .with_vector(vec![0.5, -1.0])
            .with_chunk(1, 2);
        let model = Model::try_from(input).unwrap();

        assert_eq!(model.content_id, content_id);
        assert_eq!(model.embedding_vector.as_deref(), Some("[0.5,-1]"));
        assert_eq!(model.chunk_index, 1);
        assert_eq!(model.chunk_total, 2);
        assert_eq!(model.metadata, json!({}));
        assert_eq!(model.created_at, model.updated_at);
    }

    #[test]
    fn test_lenient_conversion_drops_malformed_vector() {
        let embedding: Embedding = model_with_vector(Some("[1,2,")).into();
        assert!(embedding.embedding_vector.is_none());
        assert_eq!(embedding.metadata_as::<String>("language").as_deref(), Some("rust"));
    }

    #[test]
    fn test_strict_conversion_reports_record() {
        let model = model_with_vector(Some("[1,abc]"));
        let id = model.id;
        let err = Embedding::try_from_model(model).unwrap_err();
        assert!(matches!(err, EmbeddingError::Decode { id: bad, .. } if bad == id));
    }

    #[test]
    fn test_strict_conversion_decodes_vector() {
        let embedding = Embedding::try_from_model(model_with_vector(Some("[0.25,1]"))).unwrap();
        assert_eq!(embedding.embedding_vector, Some(vec![0.25, 1.0]));
        assert_eq!(embedding.vector_dimensions(), Some(2));

        let empty = Embedding::try_from_model(model_with_vector(None)).unwrap();
        assert_eq!(empty.vector_dimensions(), None);
    }

    #[test]
    fn test_chunk_numbers_beyond_column_range_are_rejected() {
        let too_far = NewEmbedding::new(Uuid::now_v7(), ContentType::Comment, "x")
            .with_chunk(u32::MAX - 1, u32::MAX);
        let err = Model::try_from(too_far).unwrap_err();
        assert!(matches!(err, EmbeddingError::Validation(msg) if msg.contains("chunk_index")));

        let last_storable = NewEmbedding::new(Uuid::now_v7(), ContentType::Comment, "x")
            .with_chunk(0, i32::MAX as u32);
        assert_eq!(Model::try_from(last_storable).unwrap().chunk_total, i32::MAX);
    }

    #[test]
    fn test_lenient_conversion_drops_empty_vector() {
        let embedding: Embedding = model_with_vector(Some("[]")).into();
        assert!(!embedding.has_vector());
    }

    #[test]
    fn test_non_object_metadata_reads_as_empty() {
        let mut model = model_with_vector(None);
        model.metadata = json!(["not", "an", "object"]);
        let embedding: Embedding = model.into();
        assert!(embedding.metadata.is_empty());
    }
}
