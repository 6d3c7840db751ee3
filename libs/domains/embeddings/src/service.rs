use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::chunking;
use crate::config::EmbeddingStoreConfig;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::maintenance::MaintenanceJobs;
use crate::models::{
    ContentDocument, ContentType, ContentTypeStats, Embedding, EmbeddingFilter, NewEmbedding,
    PageRequest, ReassembledContent, ScoredEmbedding, SimilarityQuery,
};
use crate::provider::EmbeddingProvider;
use crate::repository::EmbeddingRepository;
use crate::search;

pub(crate) fn check_page(page: &PageRequest) -> EmbeddingResult<()> {
    if page.limit == 0 {
        return Err(EmbeddingError::Validation(
            "page limit must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn require_non_blank(what: &str, value: &str) -> EmbeddingResult<()> {
    if value.trim().is_empty() {
        return Err(EmbeddingError::Validation(format!("{what} must not be blank")));
    }
    Ok(())
}

/// Service layer for the embedding store: validation, chunking and search
pub struct EmbeddingService<R: EmbeddingRepository> {
    repository: Arc<R>,
    config: EmbeddingStoreConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl<R: EmbeddingRepository> Clone for EmbeddingService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            config: self.config.clone(),
            provider: self.provider.clone(),
        }
    }
}

impl<R: EmbeddingRepository> EmbeddingService<R> {
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, EmbeddingStoreConfig::default())
    }

    pub fn with_config(repository: R, config: EmbeddingStoreConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            config,
            provider: None,
        }
    }

    /// Use `provider` to embed chunks on the document ingest path
    pub fn with_embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(&self) -> &EmbeddingStoreConfig {
        &self.config
    }

    /// Maintenance jobs sharing this service's repository
    pub fn maintenance(&self) -> MaintenanceJobs<R> {
        MaintenanceJobs::new(Arc::clone(&self.repository))
    }

    fn check_vector(&self, model: &str, vector: &[f32]) -> EmbeddingResult<()> {
        let expected = self.config.models.dimension_of(model).ok_or_else(|| {
            EmbeddingError::Validation(format!("unknown embedding model '{model}'"))
        })?;

        if vector.len() != expected {
            return Err(EmbeddingError::Validation(format!(
                "vector has {} dimensions, model '{model}' expects {expected}",
                vector.len()
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::Validation(
                "vector contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_input(&self, input: &NewEmbedding) -> EmbeddingResult<()> {
        input.validate()?;

        if input.chunk_index >= input.chunk_total {
            return Err(EmbeddingError::Validation(format!(
                "chunk_index {} is out of range for chunk_total {}",
                input.chunk_index, input.chunk_total
            )));
        }

        if !self.config.models.contains(&input.embedding_model) {
            return Err(EmbeddingError::Validation(format!(
                "unknown embedding model '{}'",
                input.embedding_model
            )));
        }

        if let Some(vector) = &input.embedding_vector {
            self.check_vector(&input.embedding_model, vector)?;
        }
        Ok(())
    }

    /// Store a single embedding record
    pub async fn create_embedding(&self, input: NewEmbedding) -> EmbeddingResult<Embedding> {
        self.validate_input(&input)?;
        self.repository.create(input).await
    }

    /// Store a complete chunk set in one transaction
    pub async fn store_chunk_set(
        &self,
        inputs: Vec<NewEmbedding>,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let (content_id, content_type) = match inputs.first() {
            Some(first) => (first.content_id, first.content_type),
            None => {
                return Err(EmbeddingError::Validation(
                    "chunk set must not be empty".to_string(),
                ));
            }
        };

        for input in &inputs {
            self.validate_input(input)?;
        }
        if let Some(problem) = chunking::layout_problem(content_id, content_type, &inputs) {
            return Err(EmbeddingError::Validation(format!("invalid chunk set: {problem}")));
        }

        self.repository.create_chunk_set(inputs).await
    }

    /// Split a document, embed each chunk and replace its stored chunk set.
    ///
    /// The provider is called before anything is written; without a provider
    /// chunks are stored without vectors.
    pub async fn store_document(
        &self,
        document: ContentDocument,
    ) -> EmbeddingResult<Vec<Embedding>> {
        let model = document
            .embedding_model
            .unwrap_or_else(|| self.config.default_model.clone());
        let expected = self.config.models.dimension_of(&model).ok_or_else(|| {
            EmbeddingError::Validation(format!("unknown embedding model '{model}'"))
        })?;

        let chunks = chunking::split(&document.text, self.config.max_chunk_chars)?;

        let mut inputs = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let mut input =
                NewEmbedding::new(document.content_id, document.content_type, chunk.text)
                    .with_model(model.clone())
                    .with_chunk(chunk.index, chunk.total);
            input.metadata = document.metadata.clone();

            if let Some(provider) = &self.provider {
                let vector = provider.embed(&model, &input.content_text).await?;
                if vector.len() != expected {
                    return Err(EmbeddingError::Provider(format!(
                        "provider returned {} dimensions for '{model}', expected {expected}",
                        vector.len()
                    )));
                }
                input.embedding_vector = Some(vector);
            }

            self.validate_input(&input)?;
            inputs.push(input);
        }

        tracing::debug!(
            content_id = %document.content_id,
            chunks = inputs.len(),
            embedded = self.provider.is_some(),
            "Storing document"
        );

        self.repository
            .replace_chunk_set(document.content_id, document.content_type, inputs)
            .await
    }

    pub async fn get_embedding(&self, id: Uuid) -> EmbeddingResult<Embedding> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(EmbeddingError::NotFound(id))
    }

    pub async fn delete_embedding(&self, id: Uuid) -> EmbeddingResult<()> {
        let deleted = self.repository.delete_by_id(id).await?;

        if !deleted {
            return Err(EmbeddingError::NotFound(id));
        }

        Ok(())
    }

    pub async fn find_by_content(&self, content_id: Uuid) -> EmbeddingResult<Vec<Embedding>> {
        self.repository.find_by_content(content_id).await
    }

    pub async fn find_by_content_and_type(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<Vec<Embedding>> {
        self.repository
            .find_by_content_and_type(content_id, content_type)
            .await
    }

    pub async fn find_multi_chunk(&self, content_id: Uuid) -> EmbeddingResult<Vec<Embedding>> {
        self.repository.find_multi_chunk(content_id).await
    }

    pub async fn find_first_chunks(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<Vec<Embedding>> {
        self.repository
            .find_first_chunks(content_id, content_type)
            .await
    }

    pub async fn exists_by_content(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<bool> {
        self.repository
            .exists_by_content(content_id, content_type)
            .await
    }

    /// Chunks of one content in order, with the full text rebuilt
    pub async fn reconstruct(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<ReassembledContent> {
        let records = self
            .repository
            .find_by_content_and_type(content_id, content_type)
            .await?;
        chunking::reconstruct(content_id, content_type, records)
    }

    pub async fn list_embeddings(
        &self,
        filter: EmbeddingFilter,
    ) -> EmbeddingResult<Vec<Embedding>> {
        check_page(&filter.page)?;
        self.repository.list(filter).await
    }

    /// Replace a record's vector, checking it against the model's dimension
    pub async fn update_vector(
        &self,
        id: Uuid,
        vector: Vec<f32>,
        model: impl Into<String>,
    ) -> EmbeddingResult<Embedding> {
        let model = model.into();
        self.check_vector(&model, &vector)?;
        self.repository.update_vector(id, vector, model).await
    }

    pub async fn delete_by_content(&self, content_id: Uuid) -> EmbeddingResult<u64> {
        self.repository.delete_by_content(content_id).await
    }

    pub async fn delete_by_content_and_type(
        &self,
        content_id: Uuid,
        content_type: ContentType,
    ) -> EmbeddingResult<u64> {
        self.repository
            .delete_by_content_and_type(content_id, content_type)
            .await
    }

    pub async fn find_by_metadata_key(
        &self,
        key: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        require_non_blank("metadata key", key)?;
        check_page(&page)?;
        self.repository.find_by_metadata_key(key, page).await
    }

    pub async fn find_by_metadata_value(
        &self,
        key: &str,
        value: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        require_non_blank("metadata key", key)?;
        check_page(&page)?;
        self.repository
            .find_by_metadata_value(key, value, page)
            .await
    }

    pub async fn search_by_content_text(
        &self,
        term: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        require_non_blank("search term", term)?;
        check_page(&page)?;
        self.repository.search_by_content_text(term.trim(), page).await
    }

    pub async fn count_by_content_type(&self, content_type: ContentType) -> EmbeddingResult<u64> {
        self.repository.count_by_content_type(content_type).await
    }

    pub async fn count_by_model(&self, model: &str) -> EmbeddingResult<u64> {
        self.repository.count_by_model(model).await
    }

    pub async fn statistics(&self) -> EmbeddingResult<Vec<ContentTypeStats>> {
        self.repository.statistics().await
    }

    /// Nearest neighbours of a query vector, best match first
    pub async fn search(&self, query: SimilarityQuery) -> EmbeddingResult<Vec<ScoredEmbedding>> {
        let resolved = search::resolve_query(
            query,
            &self.config.default_model,
            self.config.max_search_limit,
            |model| self.config.models.dimension_of(model),
        )?;
        self.repository.find_nearest(resolved).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRegistry;
    use crate::provider::MockEmbeddingProvider;
    use crate::repository::{InMemoryEmbeddingRepository, MockEmbeddingRepository};
    use mockall::predicate::eq;

    fn tiny_config() -> EmbeddingStoreConfig {
        EmbeddingStoreConfig {
            default_model: "tiny".to_string(),
            max_chunk_chars: 10,
            max_search_limit: 10,
            models: ModelRegistry::empty().with_model("tiny", 3),
        }
    }

    fn tiny_service() -> EmbeddingService<InMemoryEmbeddingRepository> {
        EmbeddingService::with_config(InMemoryEmbeddingRepository::new(), tiny_config())
    }

    fn tiny_input(content_id: Uuid, text: &str) -> NewEmbedding {
        NewEmbedding::new(content_id, ContentType::CodeSnippet, text).with_model("tiny")
    }

    #[tokio::test]
    async fn test_create_rejects_dimension_mismatch() {
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo.expect_create().never();

        let service = EmbeddingService::with_config(mock_repo, tiny_config());
        let result = service
            .create_embedding(tiny_input(Uuid::now_v7(), "x").with_vector(vec![1.0, 2.0]))
            .await;

        assert!(matches!(result, Err(EmbeddingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_model_and_bad_chunk() {
        let service = tiny_service();

        let unknown = service
            .create_embedding(
                NewEmbedding::new(Uuid::now_v7(), ContentType::Comment, "x").with_model("mystery"),
            )
            .await;
        assert!(matches!(unknown, Err(EmbeddingError::Validation(_))));

        let out_of_range = service
            .create_embedding(tiny_input(Uuid::now_v7(), "x").with_chunk(2, 2))
            .await;
        assert!(matches!(out_of_range, Err(EmbeddingError::Validation(_))));

        let nil_content = service
            .create_embedding(tiny_input(Uuid::nil(), "x"))
            .await;
        assert!(matches!(nil_content, Err(EmbeddingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_embedding_not_found() {
        let id = Uuid::now_v7();
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo
            .expect_get_by_id()
            .with(eq(id))
            .returning(|_| Ok(None));

        let service = EmbeddingService::new(mock_repo);
        let result = service.get_embedding(id).await;
        assert!(matches!(result, Err(EmbeddingError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_delete_embedding_not_found() {
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo.expect_delete_by_id().returning(|_| Ok(false));

        let service = EmbeddingService::new(mock_repo);
        let result = service.delete_embedding(Uuid::now_v7()).await;
        assert!(matches!(result, Err(EmbeddingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_store_chunk_set_validates_layout() {
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo.expect_create_chunk_set().never();
        let service = EmbeddingService::with_config(mock_repo, tiny_config());
        let content_id = Uuid::now_v7();

        let empty = service.store_chunk_set(vec![]).await;
        assert!(matches!(empty, Err(EmbeddingError::Validation(_))));

        let gap = service
            .store_chunk_set(vec![
                tiny_input(content_id, "a").with_chunk(0, 3),
                tiny_input(content_id, "c").with_chunk(2, 3),
            ])
            .await;
        assert!(matches!(gap, Err(EmbeddingError::Validation(msg)) if msg.contains("missing [1]")));

        let mixed = service
            .store_chunk_set(vec![
                tiny_input(content_id, "a").with_chunk(0, 2),
                tiny_input(Uuid::now_v7(), "b").with_chunk(1, 2),
            ])
            .await;
        assert!(matches!(mixed, Err(EmbeddingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_store_chunk_set_and_reconstruct() {
        let service = tiny_service();
        let content_id = Uuid::now_v7();

        service
            .store_chunk_set(vec![
                tiny_input(content_id, "world").with_chunk(1, 2),
                tiny_input(content_id, "hello ").with_chunk(0, 2),
            ])
            .await
            .unwrap();

        let content = service
            .reconstruct(content_id, ContentType::CodeSnippet)
            .await
            .unwrap();
        assert_eq!(content.text, "hello world");
        assert_eq!(content.chunks[0].chunk_position(), "1/2");
    }

    #[tokio::test]
    async fn test_reconstruct_reports_missing_and_partial_content() {
        let service = tiny_service();
        let content_id = Uuid::now_v7();

        let missing = service.reconstruct(content_id, ContentType::CodeSnippet).await;
        assert!(matches!(missing, Err(EmbeddingError::ContentNotFound { .. })));

        service
            .create_embedding(tiny_input(content_id, "orphan").with_chunk(1, 3))
            .await
            .unwrap();
        let partial = service.reconstruct(content_id, ContentType::CodeSnippet).await;
        assert!(matches!(partial, Err(EmbeddingError::IncompleteChunkSet { .. })));
    }

    #[tokio::test]
    async fn test_store_document_without_provider() {
        let service = tiny_service();
        let content_id = Uuid::now_v7();
        let document = ContentDocument::new(
            content_id,
            ContentType::ProjectDocumentation,
            "First part. Second part.",
        )
        .with_metadata("source", "readme");

        let stored = service.store_document(document).await.unwrap();
        assert!(stored.len() > 1);
        assert!(stored.iter().all(|e| !e.has_vector()));
        assert!(stored.iter().all(|e| e.embedding_model == "tiny"));
        assert!(stored.iter().all(|e| e.has_metadata("source")));

        let content = service
            .reconstruct(content_id, ContentType::ProjectDocumentation)
            .await
            .unwrap();
        assert_eq!(content.text, "First part. Second part.");
    }

    #[tokio::test]
    async fn test_store_document_embeds_and_replaces_previous_version() {
        let mut provider = MockEmbeddingProvider::new();
        provider
            .expect_embed()
            .withf(|model, _| model == "tiny")
            .returning(|_, text| Ok(vec![text.len() as f32, 1.0, 0.0]));

        let service = tiny_service().with_embedding_provider(Arc::new(provider));
        let content_id = Uuid::now_v7();

        service
            .store_document(ContentDocument::new(
                content_id,
                ContentType::IssueDescription,
                "a long original issue text body",
            ))
            .await
            .unwrap();
        let replacement = service
            .store_document(ContentDocument::new(
                content_id,
                ContentType::IssueDescription,
                "short",
            ))
            .await
            .unwrap();

        assert_eq!(replacement.len(), 1);
        assert_eq!(replacement[0].embedding_vector, Some(vec![5.0, 1.0, 0.0]));

        let stored = service
            .find_by_content_and_type(content_id, ContentType::IssueDescription)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content_text, "short");
    }

    #[tokio::test]
    async fn test_store_document_provider_failure_writes_nothing() {
        let mut provider = MockEmbeddingProvider::new();
        provider
            .expect_embed()
            .returning(|_, _| Err(EmbeddingError::Provider("rate limited".to_string())));

        let service = tiny_service().with_embedding_provider(Arc::new(provider));
        let content_id = Uuid::now_v7();

        let result = service
            .store_document(ContentDocument::new(content_id, ContentType::Comment, "text"))
            .await;
        assert!(matches!(result, Err(EmbeddingError::Provider(_))));
        assert!(
            !service
                .exists_by_content(content_id, ContentType::Comment)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_store_document_rejects_wrong_provider_dimension() {
        let mut provider = MockEmbeddingProvider::new();
        provider.expect_embed().returning(|_, _| Ok(vec![1.0]));

        let service = tiny_service().with_embedding_provider(Arc::new(provider));
        let result = service
            .store_document(ContentDocument::new(Uuid::now_v7(), ContentType::Comment, "text"))
            .await;
        assert!(matches!(result, Err(EmbeddingError::Provider(_))));
    }

    #[tokio::test]
    async fn test_update_vector_checks_dimension() {
        let service = tiny_service();
        let created = service
            .create_embedding(tiny_input(Uuid::now_v7(), "x"))
            .await
            .unwrap();

        let wrong = service.update_vector(created.id, vec![1.0], "tiny").await;
        assert!(matches!(wrong, Err(EmbeddingError::Validation(_))));

        let first = service
            .update_vector(created.id, vec![1.0, 0.0, 0.0], "tiny")
            .await
            .unwrap();
        let second = service
            .update_vector(created.id, vec![1.0, 0.0, 0.0], "tiny")
            .await
            .unwrap();
        assert_eq!(first.embedding_vector, second.embedding_vector);
        assert_eq!(first.embedding_model, second.embedding_model);

        let missing = service
            .update_vector(Uuid::now_v7(), vec![1.0, 0.0, 0.0], "tiny")
            .await;
        assert!(matches!(missing, Err(EmbeddingError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_search_returns_best_matches_first() {
        let service = tiny_service();
        for (text, vector) in [
            ("exact", vec![1.0, 0.0, 0.0]),
            ("close", vec![0.9, 0.1, 0.0]),
            ("orthogonal", vec![0.0, 1.0, 0.0]),
            ("opposite", vec![-1.0, 0.0, 0.0]),
        ] {
            service
                .create_embedding(tiny_input(Uuid::now_v7(), text).with_vector(vector))
                .await
                .unwrap();
        }

        let hits = service
            .search(SimilarityQuery::new(vec![1.0, 0.0, 0.0]).with_threshold(0.5))
            .await
            .unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.embedding.content_text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "close"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

        let all = service
            .search(SimilarityQuery::new(vec![1.0, 0.0, 0.0]).with_threshold(-1.0).with_limit(3))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_search_filters_by_content_type() {
        let service = tiny_service();
        service
            .create_embedding(tiny_input(Uuid::now_v7(), "code").with_vector(vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        service
            .create_embedding(
                NewEmbedding::new(Uuid::now_v7(), ContentType::Comment, "comment")
                    .with_model("tiny")
                    .with_vector(vec![1.0, 0.0, 0.0]),
            )
            .await
            .unwrap();

        let hits = service
            .search(
                SimilarityQuery::new(vec![1.0, 0.0, 0.0]).with_content_type(ContentType::Comment),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].embedding.content_type, ContentType::Comment);
    }

    #[tokio::test]
    async fn test_default_query_fits_default_config() {
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo
            .expect_find_nearest()
            .times(1)
            .returning(|_| Ok(vec![]));

        let service = EmbeddingService::new(mock_repo);
        let dims = service.config().default_dimension().unwrap();
        let hits = service
            .search(SimilarityQuery::new(vec![0.5; dims]))
            .await
            .unwrap();
        assert!(hits.is_empty());

        let tiny = tiny_service();
        assert!(tiny.search(SimilarityQuery::new(vec![1.0, 0.0, 0.0])).await.is_ok());
    }

    #[tokio::test]
    async fn test_search_threshold_one_requires_same_direction() {
        let service = tiny_service();
        let skewed = service
            .create_embedding(tiny_input(Uuid::now_v7(), "skewed").with_vector(vec![2.0, 0.2, 0.0]))
            .await
            .unwrap();

        let strict = SimilarityQuery::new(vec![1.0, 0.0, 0.0]).with_threshold(1.0);
        let hits = service.search(strict.clone()).await.unwrap();
        assert!(hits.is_empty());

        let loose = service
            .search(SimilarityQuery::new(vec![1.0, 0.0, 0.0]).with_threshold(0.9))
            .await
            .unwrap();
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].embedding.id, skewed.id);

        let scaled = service
            .create_embedding(tiny_input(Uuid::now_v7(), "scaled").with_vector(vec![3.0, 0.0, 0.0]))
            .await
            .unwrap();
        let hits = service.search(strict).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].embedding.id, scaled.id);
    }

    #[tokio::test]
    async fn test_deleted_middle_chunk_breaks_reconstruction() {
        let service = tiny_service();
        let content_id = Uuid::now_v7();

        let stored = service
            .store_chunk_set(vec![
                tiny_input(content_id, "one ").with_chunk(0, 3),
                tiny_input(content_id, "two ").with_chunk(1, 3),
                tiny_input(content_id, "three").with_chunk(2, 3),
            ])
            .await
            .unwrap();

        let multi = service.find_multi_chunk(content_id).await.unwrap();
        assert_eq!(
            multi.iter().map(|e| e.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        let middle = stored.iter().find(|e| e.chunk_index == 1).unwrap();
        service.delete_embedding(middle.id).await.unwrap();

        match service.reconstruct(content_id, ContentType::CodeSnippet).await {
            Err(EmbeddingError::IncompleteChunkSet { details, .. }) => {
                assert!(details.contains("missing [1]"), "{details}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_rejects_invalid_queries_before_dispatch() {
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo.expect_find_nearest().never();
        let service = EmbeddingService::with_config(mock_repo, tiny_config());

        let too_many = service
            .search(SimilarityQuery::new(vec![1.0, 0.0, 0.0]).with_limit(11))
            .await;
        assert!(matches!(too_many, Err(EmbeddingError::InvalidQuery(_))));

        let wrong_dims = service.search(SimilarityQuery::new(vec![1.0])).await;
        assert!(matches!(wrong_dims, Err(EmbeddingError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_blank_inputs_are_rejected() {
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo.expect_search_by_content_text().never();
        mock_repo.expect_find_by_metadata_key().never();
        mock_repo.expect_list().never();
        let service = EmbeddingService::with_config(mock_repo, tiny_config());

        let blank = service
            .search_by_content_text("   ", PageRequest::default())
            .await;
        assert!(matches!(blank, Err(EmbeddingError::Validation(_))));

        let blank_key = service
            .find_by_metadata_key("", PageRequest::default())
            .await;
        assert!(matches!(blank_key, Err(EmbeddingError::Validation(_))));

        let zero_limit = service
            .list_embeddings(EmbeddingFilter {
                page: PageRequest::new(0, 0),
                ..Default::default()
            })
            .await;
        assert!(matches!(zero_limit, Err(EmbeddingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_maintenance_shares_repository() {
        let service = tiny_service();
        let created = service
            .create_embedding(tiny_input(Uuid::now_v7(), "pending"))
            .await
            .unwrap();

        let pending = service
            .maintenance()
            .find_without_vector(PageRequest::default())
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, created.id);
    }
}
