use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::BaseRepository;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
    TransactionTrait, Value,
};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    codec, entity,
    error::{EmbeddingError, EmbeddingResult},
    models::{
        ContentType, ContentTypeStats, Embedding, EmbeddingFilter, NearestQuery, NewEmbedding,
        PageRequest, ScoredEmbedding,
    },
    repository::EmbeddingRepository,
};

/// Literals `codec::decode` accepts with at least one element. Anything else
/// in `embedding_vector` is treated as no vector.
const VECTOR_LITERAL_PATTERN: &str = concat!(
    r"^\s*\[\s*",
    r"[-+]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?",
    r"(\s*,\s*[-+]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?)*",
    r"\s*\]\s*$",
);

#[derive(Debug, FromQueryResult)]
struct IdRow {
    id: Uuid,
}

#[derive(Debug, FromQueryResult)]
struct ScoredRow {
    id: Uuid,
    score: f64,
}

#[derive(Debug, FromQueryResult)]
struct StatsRow {
    content_type: String,
    total: i64,
    with_vector: i64,
}

/// PostgreSQL (+pgvector) implementation of EmbeddingRepository
pub struct PgEmbeddingRepository {
    base: BaseRepository<entity::Entity>,
}

impl PgEmbeddingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn statement(sql: &str, values: Vec<Value>) -> Statement {
        Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
    }

    /// Run a query selecting `id`, then load the rows in the same order
    async fn find_by_id_query(
        &self,
        sql: &str,
        values: Vec<Value>,
    ) -> EmbeddingResult<Vec<entity::Model>> {
        let ids: Vec<Uuid> = IdRow::find_by_statement(Self::statement(sql, values))
            .all(self.base.db())
            .await?
            .into_iter()
            .map(|row| row.id)
            .collect();

        self.load_in_order(&ids).await
    }

    async fn load_in_order(&self, ids: &[Uuid]) -> EmbeddingResult<Vec<entity::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<Uuid, entity::Model> = entity::Entity::find()
            .filter(entity::Column::Id.is_in(ids.iter().copied()))
            .all(self.base.db())
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        // Rows deleted between the two queries are skipped
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    fn page_values(page: PageRequest) -> [Value; 2] {
        [
            (page.limit.min(i64::MAX as u64) as i64).into(),
            (page.offset.min(i64::MAX as u64) as i64).into(),
        ]
    }

    fn into_embeddings(models: Vec<entity::Model>) -> Vec<Embedding> {
        models.into_iter().map(Embedding::from).collect()
    }

    // All inputs convert before the transaction opens
    fn to_models(inputs: Vec<NewEmbedding>) -> EmbeddingResult<Vec<entity::Model>> {
        inputs.into_iter().map(entity::Model::try_from).collect()
    }
}

#[async_trait]
impl EmbeddingRepository for PgEmbeddingRepository {
    async fn create(&self, input: NewEmbedding) -> EmbeddingResult<Embedding> {
        let model = entity::Model::try_from(input)?;
        let stored = self.base.insert(model.into_insert()).await?;

        tracing::info!(
            embedding_id = %stored.id,
            content_id = %stored.content_id,
            "Created embedding"
        );
        Ok(stored.into())
    }

    async fn create_chunk_set(
        &self,
        inputs: Vec<NewEmbedding>,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let models = Self::to_models(inputs)?;
        let txn = self.base.db().begin().await?;

        let mut stored = Vec::with_capacity(models.len());
        for model in models {
            stored.push(model.into_insert().insert(&txn).await?);
        }

        txn.commit().await?;

        tracing::info!(chunks = stored.len(), "Created chunk set");
        Ok(Self::into_embeddings(stored))
    }

    async fn replace_chunk_set(
        &self,
        content_id: Uuid,
        content_type: ContentType,
        inputs: Vec<NewEmbedding>,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let models = Self::to_models(inputs)?;
        let txn = self.base.db().begin().await?;

        let removed = entity::Entity::delete_many()
            .filter(entity::Column::ContentId.eq(content_id))
            .filter(entity::Column::ContentType.eq(content_type))
            .exec(&txn)
            .await?
            .rows_affected;

        let mut stored = Vec::with_capacity(models.len());
        for model in models {
            stored.push(model.into_insert().insert(&txn).await?);
        }

        txn.commit().await?;

        tracing::info!(
            content_id = %content_id,
            content_type = %content_type,
            removed,
            stored = stored.len(),
            "Replaced chunk set"
        );
        Ok(Self::into_embeddings(stored))
    }

    async fn get_by_id(&self, id: Uuid) -> EmbeddingResult<Option<Embedding>> {
        let model = self.base.find_by_id(id).await?;
        Ok(model.map(Embedding::from))
    }

    async fn delete_by_id(&self, id: Uuid) -> EmbeddingResult<bool> {
        let rows_affected = self.base.delete_by_id(id).await?;

        if rows_affected > 0 {
            tracing::info!(embedding_id = %id, "Deleted embedding");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn find_by_content(&self, content_id: Uuid) -> EmbeddingResult<Vec<Embedding>> {
        let models = entity::Entity::find()
            .filter(entity::Column::ContentId.eq(content_id))
            .order_by_asc(entity::Column::ContentType)
            .order_by_asc(entity::Column::ChunkIndex)
            .order_by_asc(entity::Column::Id)
            .all(self.base.db())
            .await?;

        Ok(Self::into_embeddings(models))
    }

    async fn find_by_content_and_type(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let models = entity::Entity::find()
            .filter(entity::Column::ContentId.eq(content_id))
            .filter(entity::Column::ContentType.eq(content_type))
            .order_by_asc(entity::Column::ChunkIndex)
            .order_by_asc(entity::Column::Id)
            .all(self.base.db())
            .await?;

        Ok(Self::into_embeddings(models))
    }

    async fn find_multi_chunk(&self, content_id: Uuid) -> EmbeddingResult<Vec<Embedding>> {
        let models = entity::Entity::find()
            .filter(entity::Column::ContentId.eq(content_id))
            .filter(entity::Column::ChunkTotal.gt(1))
            .order_by_asc(entity::Column::ContentType)
            .order_by_asc(entity::Column::ChunkIndex)
            .order_by_asc(entity::Column::Id)
            .all(self.base.db())
            .await?;

        Ok(Self::into_embeddings(models))
    }

    async fn find_first_chunks(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let models = entity::Entity::find()
            .filter(entity::Column::ContentId.eq(content_id))
            .filter(entity::Column::ContentType.eq(content_type))
            .filter(entity::Column::ChunkIndex.eq(0))
            .order_by_asc(entity::Column::CreatedAt)
            .order_by_asc(entity::Column::Id)
            .all(self.base.db())
            .await?;

        Ok(Self::into_embeddings(models))
    }

    async fn exists_by_content(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<bool> {
        let count = entity::Entity::find()
            .filter(entity::Column::ContentId.eq(content_id))
            .filter(entity::Column::ContentType.eq(content_type))
            .count(self.base.db())
            .await?;

        Ok(count > 0)
    }

    async fn list(&self, filter: EmbeddingFilter) -> EmbeddingResult<Vec<Embedding>> {
        let mut query = entity::Entity::find();

        if let Some(content_type) = filter.content_type {
            query = query.filter(entity::Column::ContentType.eq(content_type));
        }

        if let Some(model) = filter.embedding_model {
            query = query.filter(entity::Column::EmbeddingModel.eq(model));
        }

        if let Some(after) = filter.created_after {
            query = query.filter(entity::Column::CreatedAt.gt(after));
        }

        let models = query
            .order_by_desc(entity::Column::CreatedAt)
            .order_by_desc(entity::Column::Id)
            .limit(filter.page.limit)
            .offset(filter.page.offset)
            .all(self.base.db())
            .await?;

        Ok(Self::into_embeddings(models))
    }

    async fn update_vector(
        &self,
        id: Uuid,
        vector: Vec<f32>,
        model: String,
    ) -> EmbeddingResult<Embedding> {
        let existing = self
            .base
            .find_by_id(id)
            .await?
            .ok_or(EmbeddingError::NotFound(id))?;

        let mut active: entity::ActiveModel = existing.into();
        active.embedding_vector = Set(Some(codec::encode(&vector)));
        active.embedding_model = Set(model);
        active.updated_at = Set(Utc::now().into());

        let updated = match self.base.update(active).await {
            Ok(updated) => updated,
            // Deleted after the lookup
            Err(DbErr::RecordNotUpdated) => return Err(EmbeddingError::NotFound(id)),
            Err(err) => return Err(err.into()),
        };

        tracing::info!(embedding_id = %id, dimensions = vector.len(), "Updated embedding vector");
        Ok(updated.into())
    }

    async fn delete_by_content(&self, content_id: Uuid) -> EmbeddingResult<u64> {
        let removed = entity::Entity::delete_many()
            .filter(entity::Column::ContentId.eq(content_id))
            .exec(self.base.db())
            .await?
            .rows_affected;

        tracing::info!(content_id = %content_id, removed, "Deleted embeddings by content");
        Ok(removed)
    }

    async fn delete_by_content_and_type(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<u64> {
        let removed = entity::Entity::delete_many()
            .filter(entity::Column::ContentId.eq(content_id))
            .filter(entity::Column::ContentType.eq(content_type))
            .exec(self.base.db())
            .await?
            .rows_affected;

        tracing::info!(
            content_id = %content_id,
            content_type = %content_type,
            removed,
            "Deleted embeddings by content and type"
        );
        Ok(removed)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> EmbeddingResult<u64> {
        let removed = entity::Entity::delete_many()
            .filter(entity::Column::CreatedAt.lt(cutoff))
            .exec(self.base.db())
            .await?
            .rows_affected;

        tracing::info!(%cutoff, removed, "Deleted embeddings older than cutoff");
        Ok(removed)
    }

    async fn find_by_metadata_key(
        &self,
        key: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        // jsonb_exists instead of `?`, which collides with placeholder syntax
        let sql = r#"
            SELECT id FROM embeddings
            WHERE jsonb_exists(metadata, $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
        "#;
        let [limit, offset] = Self::page_values(page);

        let models = self
            .find_by_id_query(sql, vec![key.into(), limit, offset])
            .await?;
        Ok(Self::into_embeddings(models))
    }

    async fn find_by_metadata_value(
        &self,
        key: &str,
        value: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let sql = r#"
            SELECT id FROM embeddings
            WHERE metadata ->> $1 = $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
        "#;
        let [limit, offset] = Self::page_values(page);

        let models = self
            .find_by_id_query(sql, vec![key.into(), value.into(), limit, offset])
            .await?;
        Ok(Self::into_embeddings(models))
    }

    async fn search_by_content_text(
        &self,
        term: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let sql = r#"
            SELECT id FROM embeddings
            WHERE to_tsvector('english', content_text) @@ plainto_tsquery('english', $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
        "#;
        let [limit, offset] = Self::page_values(page);

        let models = self
            .find_by_id_query(sql, vec![term.into(), limit, offset])
            .await?;
        Ok(Self::into_embeddings(models))
    }

    async fn count_by_content_type(&self, content_type: ContentType) -> EmbeddingResult<u64> {
        let count = entity::Entity::find()
            .filter(entity::Column::ContentType.eq(content_type))
            .count(self.base.db())
            .await?;
        Ok(count)
    }

    async fn count_by_model(&self, model: &str) -> EmbeddingResult<u64> {
        let count = entity::Entity::find()
            .filter(entity::Column::EmbeddingModel.eq(model))
            .count(self.base.db())
            .await?;
        Ok(count)
    }

    async fn statistics(&self) -> EmbeddingResult<Vec<ContentTypeStats>> {
        let sql = r#"
            SELECT content_type::text AS content_type,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE embedding_vector ~ $1) AS with_vector
            FROM embeddings
            GROUP BY content_type
            ORDER BY content_type
        "#;

        let rows = StatsRow::find_by_statement(Self::statement(
            sql,
            vec![VECTOR_LITERAL_PATTERN.into()],
        ))
            .all(self.base.db())
            .await?;

        rows.into_iter()
            .map(|row| {
                let content_type = ContentType::from_str(&row.content_type).map_err(|_| {
                    DbErr::Type(format!("unknown content type '{}'", row.content_type))
                })?;
                Ok(ContentTypeStats {
                    content_type,
                    total: row.total.max(0) as u64,
                    with_vector: row.with_vector.max(0) as u64,
                })
            })
            .collect()
    }

    async fn find_nearest(&self, query: NearestQuery) -> EmbeddingResult<Vec<ScoredEmbedding>> {
        // A zero vector has no direction: pgvector yields NaN, scored here as 0
        let mut values: Vec<Value> = vec![
            codec::encode(&query.vector).into(),
            query.embedding_model.clone().into(),
        ];
        let mut candidate_filter = String::new();
        if let Some(content_type) = query.content_type {
            values.push(content_type.to_string().into());
            candidate_filter = format!(
                " AND content_type = CAST(${} AS embedding_content_type)",
                values.len()
            );
        }
        values.push(query.threshold.into());
        let threshold_param = values.len();
        values.push((query.limit.min(i64::MAX as u64) as i64).into());
        let limit_param = values.len();

        let sql = format!(
            r#"
            SELECT id, score FROM (
                SELECT id,
                       CASE WHEN distance = 'NaN'::float8 THEN 0.0::float8
                            ELSE 1.0::float8 - distance END AS score
                FROM (
                    SELECT id, (embedding_vector::vector <=> $1::vector)::float8 AS distance
                    FROM embeddings
                    WHERE embedding_vector IS NOT NULL
                      AND embedding_model = $2{candidate_filter}
                ) AS candidates
            ) AS scored
            WHERE score >= ${threshold_param}
            ORDER BY score DESC, id ASC
            LIMIT ${limit_param}
            "#
        );

        let rows = ScoredRow::find_by_statement(Self::statement(&sql, values))
            .all(self.base.db())
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut models: HashMap<Uuid, entity::Model> = self
            .load_in_order(&ids)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(model) = models.remove(&row.id) {
                hits.push(ScoredEmbedding {
                    embedding: Embedding::try_from_model(model)?,
                    score: row.score,
                });
            }
        }

        tracing::debug!(
            model = %query.embedding_model,
            hits = hits.len(),
            "Similarity search completed"
        );
        Ok(hits)
    }

    async fn find_needing_reprocessing(
        &self,
        older_than: DateTime<Utc>,
        model: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let models = entity::Entity::find()
            .filter(entity::Column::CreatedAt.lt(older_than))
            .filter(entity::Column::EmbeddingModel.eq(model))
            .order_by_asc(entity::Column::CreatedAt)
            .order_by_asc(entity::Column::Id)
            .limit(page.limit)
            .offset(page.offset)
            .all(self.base.db())
            .await?;

        Ok(Self::into_embeddings(models))
    }

    async fn find_without_vector(&self, page: PageRequest) -> EmbeddingResult<Vec<Embedding>> {
        let sql = r#"
            SELECT id FROM embeddings
            WHERE embedding_vector IS NULL OR embedding_vector !~ $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
        "#;
        let [limit, offset] = Self::page_values(page);

        let models = self
            .find_by_id_query(sql, vec![VECTOR_LITERAL_PATTERN.into(), limit, offset])
            .await?;
        Ok(Self::into_embeddings(models))
    }
}
