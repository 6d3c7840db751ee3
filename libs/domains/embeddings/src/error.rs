use thiserror::Error;
use uuid::Uuid;

use crate::codec::DecodeError;
use crate::models::ContentType;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Embedding not found: {0}")]
    NotFound(Uuid),

    #[error("No embeddings stored for {content_type} content {content_id}")]
    ContentNotFound {
        content_id: Uuid,
        content_type: ContentType,
    },

    #[error("Incomplete chunk set for {content_type} content {content_id}: {details}")]
    IncompleteChunkSet {
        content_id: Uuid,
        content_type: ContentType,
        details: String,
    },

    #[error("Stored vector of embedding {id} is malformed: {source}")]
    Decode {
        id: Uuid,
        #[source]
        source: DecodeError,
    },

    #[error("Invalid similarity query: {0}")]
    InvalidQuery(String),

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

impl From<validator::ValidationErrors> for EmbeddingError {
    fn from(err: validator::ValidationErrors) -> Self {
        EmbeddingError::Validation(err.to_string())
    }
}
