use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use crate::chunking;
use crate::codec;

/// Default model recorded on embeddings that don't name one
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Free-form metadata attached to an embedding (a JSON object)
pub type Metadata = serde_json::Map<String, Value>;

/// Kind of source content an embedding was produced from
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "embedding_content_type"
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentType {
    #[sea_orm(string_value = "project_description")]
    ProjectDescription,
    #[sea_orm(string_value = "project_documentation")]
    ProjectDocumentation,
    #[sea_orm(string_value = "code_snippet")]
    CodeSnippet,
    #[sea_orm(string_value = "user_profile")]
    UserProfile,
    #[sea_orm(string_value = "commit_message")]
    CommitMessage,
    #[sea_orm(string_value = "issue_description")]
    IssueDescription,
    #[sea_orm(string_value = "pull_request_description")]
    PullRequestDescription,
    #[sea_orm(string_value = "comment")]
    Comment,
}

/// A stored embedding: one chunk of one piece of source content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub id: Uuid,
    /// Identifier of the source entity (not owned by this store)
    pub content_id: Uuid,
    pub content_type: ContentType,
    /// Exact text of this chunk
    pub content_text: String,
    /// Absent until the chunk has been embedded
    pub embedding_vector: Option<Vec<f32>>,
    pub embedding_model: String,
    pub chunk_index: u32,
    pub chunk_total: u32,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Embedding {
    pub fn is_multi_chunk(&self) -> bool {
        self.chunk_total > 1
    }

    pub fn is_first_chunk(&self) -> bool {
        self.chunk_index == 0
    }

    pub fn is_last_chunk(&self) -> bool {
        self.chunk_total > 0 && self.chunk_index == self.chunk_total - 1
    }

    /// Human readable position, e.g. "2/3"
    pub fn chunk_position(&self) -> String {
        chunking::chunk_position(self.chunk_index, self.chunk_total)
    }

    pub fn has_vector(&self) -> bool {
        self.embedding_vector.is_some()
    }

    /// Vector dimension, `None` when no vector is stored
    pub fn vector_dimensions(&self) -> Option<usize> {
        self.embedding_vector.as_ref().map(Vec::len)
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Typed metadata lookup; `None` if the key is missing or has another type
    pub fn metadata_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.metadata
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// The content identity this chunk belongs to
    pub fn content_key(&self) -> (Uuid, ContentType) {
        (self.content_id, self.content_type)
    }
}

fn validate_content_id(id: &Uuid) -> Result<(), validator::ValidationError> {
    if id.is_nil() {
        return Err(validator::ValidationError::new("missing_content_id"));
    }
    Ok(())
}

fn validate_vector_values(vector: &[f32]) -> Result<(), validator::ValidationError> {
    if vector.is_empty() {
        return Err(validator::ValidationError::new("empty_vector"));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(validator::ValidationError::new("non_finite_vector"));
    }
    Ok(())
}

/// Input for creating a single embedding record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewEmbedding {
    #[validate(custom(function = "validate_content_id"))]
    pub content_id: Uuid,
    pub content_type: ContentType,
    #[validate(length(min = 1))]
    pub content_text: String,
    #[validate(custom(function = "validate_vector_values"))]
    pub embedding_vector: Option<Vec<f32>>,
    #[serde(default = "default_model")]
    #[validate(length(min = 1, max = 100))]
    pub embedding_model: String,
    #[serde(default)]
    pub chunk_index: u32,
    #[serde(default = "default_chunk_total")]
    #[validate(range(min = 1))]
    pub chunk_total: u32,
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_chunk_total() -> u32 {
    1
}

impl NewEmbedding {
    /// A single-chunk record without a vector, using the default model
    pub fn new(
        content_id: Uuid,
        content_type: ContentType,
        content_text: impl Into<String>,
    ) -> Self {
        Self {
            content_id,
            content_type,
            content_text: content_text.into(),
            embedding_vector: None,
            embedding_model: default_model(),
            chunk_index: 0,
            chunk_total: 1,
            metadata: Metadata::new(),
        }
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.embedding_vector = Some(vector);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_chunk(mut self, index: u32, total: u32) -> Self {
        self.chunk_index = index;
        self.chunk_total = total;
        self
    }

    /// Insert or overwrite a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn encoded_vector(&self) -> Option<String> {
        self.embedding_vector.as_deref().map(codec::encode)
    }
}

/// Whole source document submitted for chunking and embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDocument {
    pub content_id: Uuid,
    pub content_type: ContentType,
    pub text: String,
    /// Model to embed with; the configured default when absent
    pub embedding_model: Option<String>,
    /// Copied onto every chunk
    #[serde(default)]
    pub metadata: Metadata,
}

impl ContentDocument {
    pub fn new(content_id: Uuid, content_type: ContentType, text: impl Into<String>) -> Self {
        Self {
            content_id,
            content_type,
            text: text.into(),
            embedding_model: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Chunks of one document reassembled in order
#[derive(Debug, Clone, Serialize)]
pub struct ReassembledContent {
    pub content_id: Uuid,
    pub content_type: ContentType,
    pub chunks: Vec<Embedding>,
    pub text: String,
}

/// Offset pagination for list-style queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 {
    50
}

impl PageRequest {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    pub fn first(limit: u64) -> Self {
        Self { limit, offset: 0 }
    }

    /// The page following this one
    pub fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Query filters for listing embeddings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingFilter {
    pub content_type: Option<ContentType>,
    pub embedding_model: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page: PageRequest,
}

/// Nearest-neighbour request as handed to the storage engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestQuery {
    pub vector: Vec<f32>,
    pub embedding_model: String,
    pub content_type: Option<ContentType>,
    pub threshold: f64,
    pub limit: u64,
}

/// Similarity search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityQuery {
    pub vector: Vec<f32>,
    /// Model the query vector was produced with; the configured default when absent
    pub embedding_model: Option<String>,
    pub content_type: Option<ContentType>,
    /// Minimum similarity score (cosine, -1.0..=1.0)
    #[serde(default)]
    pub threshold: f64,
    #[serde(default = "default_search_limit")]
    pub limit: u64,
}

fn default_search_limit() -> u64 {
    10
}

impl SimilarityQuery {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            embedding_model: None,
            content_type: None,
            threshold: 0.0,
            limit: default_search_limit(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }
}

/// A search hit with its similarity score (higher is more similar)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEmbedding {
    pub embedding: Embedding,
    pub score: f64,
}

/// Aggregate numbers for one content type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentTypeStats {
    pub content_type: ContentType,
    pub total: u64,
    pub with_vector: u64,
}

impl ContentTypeStats {
    /// Share of records that carry a vector (0.0 when there are none)
    pub fn vector_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.with_vector as f64 / self.total as f64
        }
    }
}
