use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::codec;
use crate::entity;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::models::{
    ContentType, ContentTypeStats, Embedding, EmbeddingFilter, NearestQuery, NewEmbedding,
    PageRequest, ScoredEmbedding,
};
use crate::search;

/// Repository trait for embedding persistence
///
/// Implementations store inputs as given; validation happens in the service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    /// Create a single embedding record
    async fn create(&self, input: NewEmbedding) -> EmbeddingResult<Embedding>;

    /// Create every record of a chunk set atomically
    async fn create_chunk_set(
        &self,
        inputs: Vec<NewEmbedding>,
    ) -> EmbeddingResult<Vec<Embedding>>;

    /// Atomically delete the chunk set of a content identity and store a new one
    async fn replace_chunk_set(
        &self,
        content_id: Uuid,
        content_type: ContentType,
        inputs: Vec<NewEmbedding>,
    ) -> EmbeddingResult<Vec<Embedding>>;

    /// Get an embedding by ID
    async fn get_by_id(&self, id: Uuid) -> EmbeddingResult<Option<Embedding>>;

    /// Delete an embedding by ID
    async fn delete_by_id(&self, id: Uuid) -> EmbeddingResult<bool>;

    /// All chunks of a content, ordered by content type then chunk index
    async fn find_by_content(&self, content_id: Uuid) -> EmbeddingResult<Vec<Embedding>>;

    /// Chunks of one content identity, ordered by chunk index
    async fn find_by_content_and_type(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<Vec<Embedding>>;

    /// Chunks of a content that belong to multi-chunk sets.
    ///
    /// Ordered like `find_by_content`: content type first, then chunk index,
    /// so the chunks of each set stay contiguous.
    async fn find_multi_chunk(&self, content_id: Uuid) -> EmbeddingResult<Vec<Embedding>>;

    /// Chunks with index 0 for a content identity
    async fn find_first_chunks(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<Vec<Embedding>>;

    async fn exists_by_content(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<bool>;

    /// List embeddings with optional filters, newest first
    async fn list(&self, filter: EmbeddingFilter) -> EmbeddingResult<Vec<Embedding>>;

    /// Replace the vector and model of one record
    async fn update_vector(
        &self,
        id: Uuid,
        vector: Vec<f32>,
        model: String,
    ) -> EmbeddingResult<Embedding>;

    async fn delete_by_content(&self, content_id: Uuid) -> EmbeddingResult<u64>;

    async fn delete_by_content_and_type(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<u64>;

    /// Delete records created strictly before `cutoff`
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> EmbeddingResult<u64>;

    async fn find_by_metadata_key(
        &self,
        key: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>>;

    /// Records whose metadata value under `key` has the text form `value`
    async fn find_by_metadata_value(
        &self,
        key: &str,
        value: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>>;

    /// Lexical match over chunk text
    async fn search_by_content_text(
        &self,
        term: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>>;

    async fn count_by_content_type(&self, content_type: ContentType) -> EmbeddingResult<u64>;

    async fn count_by_model(&self, model: &str) -> EmbeddingResult<u64>;

    /// Per content type totals, ordered by content type.
    /// Only decodable, non-empty vectors count towards `with_vector`.
    async fn statistics(&self) -> EmbeddingResult<Vec<ContentTypeStats>>;

    /// Nearest neighbours of a resolved query, best first
    async fn find_nearest(&self, query: NearestQuery) -> EmbeddingResult<Vec<ScoredEmbedding>>;

    /// Records of `model` created before `older_than`, oldest first
    async fn find_needing_reprocessing(
        &self,
        older_than: DateTime<Utc>,
        model: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>>;

    /// Records still waiting for a vector, oldest first.
    /// A stored vector that cannot be decoded counts as missing.
    async fn find_without_vector(&self, page: PageRequest) -> EmbeddingResult<Vec<Embedding>>;
}

/// Text form of a metadata value as compared by value queries.
/// JSON null has no text form.
pub(crate) fn metadata_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Lowercased alphanumeric words of a text
pub(crate) fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Vec<T> {
    items
        .into_iter()
        .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
        .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
        .collect()
}

fn newest_first(a: &entity::Model, b: &entity::Model) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

fn oldest_first(a: &entity::Model, b: &entity::Model) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

/// In-memory implementation of EmbeddingRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryEmbeddingRepository {
    embeddings: Arc<RwLock<HashMap<Uuid, entity::Model>>>,
}

impl InMemoryEmbeddingRepository {
    pub fn new() -> Self {
        Self {
            embeddings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a row exactly as given, bypassing conversion
    pub async fn insert_raw(&self, model: entity::Model) {
        self.embeddings.write().await.insert(model.id, model);
    }

    async fn select<F>(
        &self,
        predicate: F,
        order: fn(&entity::Model, &entity::Model) -> std::cmp::Ordering,
    ) -> Vec<entity::Model>
    where
        F: Fn(&entity::Model) -> bool,
    {
        let embeddings = self.embeddings.read().await;
        let mut rows: Vec<entity::Model> =
            embeddings.values().filter(|m| predicate(m)).cloned().collect();
        rows.sort_by(order);
        rows
    }

    fn by_content_order(a: &entity::Model, b: &entity::Model) -> std::cmp::Ordering {
        a.content_type
            .cmp(&b.content_type)
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
            .then_with(|| a.id.cmp(&b.id))
    }

    fn into_embeddings(rows: Vec<entity::Model>) -> Vec<Embedding> {
        rows.into_iter().map(Embedding::from).collect()
    }

    // All inputs convert before anything is stored
    fn to_models(inputs: Vec<NewEmbedding>) -> EmbeddingResult<Vec<entity::Model>> {
        inputs.into_iter().map(entity::Model::try_from).collect()
    }
}

fn has_usable_vector(model: &entity::Model) -> bool {
    codec::is_present(model.embedding_vector.as_deref())
}

#[async_trait]
impl EmbeddingRepository for InMemoryEmbeddingRepository {
    async fn create(&self, input: NewEmbedding) -> EmbeddingResult<Embedding> {
        let model = entity::Model::try_from(input)?;
        let mut embeddings = self.embeddings.write().await;
        embeddings.insert(model.id, model.clone());

        tracing::info!(
            embedding_id = %model.id,
            content_id = %model.content_id,
            "Created embedding"
        );
        Ok(model.into())
    }

    async fn create_chunk_set(
        &self,
        inputs: Vec<NewEmbedding>,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let models = Self::to_models(inputs)?;
        let mut embeddings = self.embeddings.write().await;
        for model in &models {
            embeddings.insert(model.id, model.clone());
        }

        tracing::info!(chunks = models.len(), "Created chunk set");
        Ok(Self::into_embeddings(models))
    }

    async fn replace_chunk_set(
        &self,
        content_id: Uuid,
        content_type: ContentType,
        inputs: Vec<NewEmbedding>,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let models = Self::to_models(inputs)?;
        let mut embeddings = self.embeddings.write().await;

        let before = embeddings.len();
        embeddings.retain(|_, m| !(m.content_id == content_id && m.content_type == content_type));
        let removed = before - embeddings.len();

        for model in &models {
            embeddings.insert(model.id, model.clone());
        }

        tracing::info!(
            content_id = %content_id,
            content_type = %content_type,
            removed,
            stored = models.len(),
            "Replaced chunk set"
        );
        Ok(Self::into_embeddings(models))
    }

    async fn get_by_id(&self, id: Uuid) -> EmbeddingResult<Option<Embedding>> {
        let embeddings = self.embeddings.read().await;
        Ok(embeddings.get(&id).cloned().map(Embedding::from))
    }

    async fn delete_by_id(&self, id: Uuid) -> EmbeddingResult<bool> {
        let mut embeddings = self.embeddings.write().await;

        if embeddings.remove(&id).is_some() {
            tracing::info!(embedding_id = %id, "Deleted embedding");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn find_by_content(&self, content_id: Uuid) -> EmbeddingResult<Vec<Embedding>> {
        let rows = self
            .select(|m| m.content_id == content_id, Self::by_content_order)
            .await;
        Ok(Self::into_embeddings(rows))
    }

    async fn find_by_content_and_type(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let rows = self
            .select(
                |m| m.content_id == content_id && m.content_type == content_type,
                Self::by_content_order,
            )
            .await;
        Ok(Self::into_embeddings(rows))
    }

    async fn find_multi_chunk(&self, content_id: Uuid) -> EmbeddingResult<Vec<Embedding>> {
        let rows = self
            .select(
                |m| m.content_id == content_id && m.chunk_total > 1,
                Self::by_content_order,
            )
            .await;
        Ok(Self::into_embeddings(rows))
    }

    async fn find_first_chunks(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let rows = self
            .select(
                |m| {
                    m.content_id == content_id
                        && m.content_type == content_type
                        && m.chunk_index == 0
                },
                oldest_first,
            )
            .await;
        Ok(Self::into_embeddings(rows))
    }

    async fn exists_by_content(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<bool> {
        let embeddings = self.embeddings.read().await;
        Ok(embeddings
            .values()
            .any(|m| m.content_id == content_id && m.content_type == content_type))
    }

    async fn list(&self, filter: EmbeddingFilter) -> EmbeddingResult<Vec<Embedding>> {
        let rows = self
            .select(
                |m| {
                    if let Some(content_type) = filter.content_type {
                        if m.content_type != content_type {
                            return false;
                        }
                    }
                    if let Some(ref model) = filter.embedding_model {
                        if &m.embedding_model != model {
                            return false;
                        }
                    }
                    if let Some(after) = filter.created_after {
                        if m.created_at <= after {
                            return false;
                        }
                    }
                    true
                },
                newest_first,
            )
            .await;
        Ok(Self::into_embeddings(paginate(rows, filter.page)))
    }

    async fn update_vector(
        &self,
        id: Uuid,
        vector: Vec<f32>,
        model: String,
    ) -> EmbeddingResult<Embedding> {
        let mut embeddings = self.embeddings.write().await;
        let row = embeddings.get_mut(&id).ok_or(EmbeddingError::NotFound(id))?;

        row.embedding_vector = Some(codec::encode(&vector));
        row.embedding_model = model;
        row.updated_at = Utc::now().into();
        let updated = row.clone();

        tracing::info!(embedding_id = %id, dimensions = vector.len(), "Updated embedding vector");
        Ok(updated.into())
    }

    async fn delete_by_content(&self, content_id: Uuid) -> EmbeddingResult<u64> {
        let mut embeddings = self.embeddings.write().await;
        let before = embeddings.len();
        embeddings.retain(|_, m| m.content_id != content_id);
        let removed = (before - embeddings.len()) as u64;

        tracing::info!(content_id = %content_id, removed, "Deleted embeddings by content");
        Ok(removed)
    }

    async fn delete_by_content_and_type(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<u64> {
        let mut embeddings = self.embeddings.write().await;
        let before = embeddings.len();
        embeddings.retain(|_, m| !(m.content_id == content_id && m.content_type == content_type));
        let removed = (before - embeddings.len()) as u64;

        tracing::info!(
            content_id = %content_id,
            content_type = %content_type,
            removed,
            "Deleted embeddings by content and type"
        );
        Ok(removed)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> EmbeddingResult<u64> {
        let mut embeddings = self.embeddings.write().await;
        let before = embeddings.len();
        embeddings.retain(|_, m| m.created_at >= cutoff);
        let removed = (before - embeddings.len()) as u64;

        tracing::info!(%cutoff, removed, "Deleted embeddings older than cutoff");
        Ok(removed)
    }

    async fn find_by_metadata_key(
        &self,
        key: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let rows = self
            .select(
                |m| m.metadata.as_object().is_some_and(|o| o.contains_key(key)),
                newest_first,
            )
            .await;
        Ok(Self::into_embeddings(paginate(rows, page)))
    }

    async fn find_by_metadata_value(
        &self,
        key: &str,
        value: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let rows = self
            .select(
                |m| {
                    m.metadata
                        .get(key)
                        .and_then(metadata_text)
                        .is_some_and(|text| text == value)
                },
                newest_first,
            )
            .await;
        Ok(Self::into_embeddings(paginate(rows, page)))
    }

    async fn search_by_content_text(
        &self,
        term: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let wanted = words(term);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .select(
                |m| {
                    let present: HashSet<String> = words(&m.content_text).into_iter().collect();
                    wanted.iter().all(|w| present.contains(w))
                },
                newest_first,
            )
            .await;
        Ok(Self::into_embeddings(paginate(rows, page)))
    }

    async fn count_by_content_type(&self, content_type: ContentType) -> EmbeddingResult<u64> {
        let embeddings = self.embeddings.read().await;
        Ok(embeddings
            .values()
            .filter(|m| m.content_type == content_type)
            .count() as u64)
    }

    async fn count_by_model(&self, model: &str) -> EmbeddingResult<u64> {
        let embeddings = self.embeddings.read().await;
        Ok(embeddings
            .values()
            .filter(|m| m.embedding_model == model)
            .count() as u64)
    }

    async fn statistics(&self) -> EmbeddingResult<Vec<ContentTypeStats>> {
        let embeddings = self.embeddings.read().await;
        let mut totals: BTreeMap<ContentType, (u64, u64)> = BTreeMap::new();
        for m in embeddings.values() {
            let entry = totals.entry(m.content_type).or_default();
            entry.0 += 1;
            if has_usable_vector(m) {
                entry.1 += 1;
            }
        }

        Ok(totals
            .into_iter()
            .map(|(content_type, (total, with_vector))| ContentTypeStats {
                content_type,
                total,
                with_vector,
            })
            .collect())
    }

    async fn find_nearest(&self, query: NearestQuery) -> EmbeddingResult<Vec<ScoredEmbedding>> {
        let candidates = self
            .select(
                |m| {
                    m.embedding_vector.is_some()
                        && m.embedding_model == query.embedding_model
                        && query.content_type.is_none_or(|t| m.content_type == t)
                },
                oldest_first,
            )
            .await;

        let mut hits = Vec::with_capacity(candidates.len());
        for model in candidates {
            let embedding = Embedding::try_from_model(model)?;
            let score = embedding
                .embedding_vector
                .as_deref()
                .map(|v| search::cosine_similarity(&query.vector, v))
                .unwrap_or_default();
            hits.push(ScoredEmbedding { embedding, score });
        }

        Ok(search::shape_results(hits, query.threshold, query.limit))
    }

    async fn find_needing_reprocessing(
        &self,
        older_than: DateTime<Utc>,
        model: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let rows = self
            .select(
                |m| m.created_at < older_than && m.embedding_model == model,
                oldest_first,
            )
            .await;
        Ok(Self::into_embeddings(paginate(rows, page)))
    }

    async fn find_without_vector(&self, page: PageRequest) -> EmbeddingResult<Vec<Embedding>> {
        let rows = self
            .select(|m| !has_usable_vector(m), oldest_first)
            .await;
        Ok(Self::into_embeddings(paginate(rows, page)))
    }
}
