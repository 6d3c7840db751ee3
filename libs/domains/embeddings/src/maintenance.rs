use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::EmbeddingResult;
use crate::models::{Embedding, PageRequest};
use crate::repository::EmbeddingRepository;
use crate::service::check_page;

/// Discovery of stale or unembedded records, and age-based purging.
///
/// Discovery is read-only: re-embedding what it finds is up to the caller.
pub struct MaintenanceJobs<R: EmbeddingRepository> {
    repository: Arc<R>,
}

impl<R: EmbeddingRepository> Clone for MaintenanceJobs<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: EmbeddingRepository> MaintenanceJobs<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Records embedded with `model` before `older_than`, oldest first
    pub async fn find_needing_reprocessing(
        &self,
        older_than: DateTime<Utc>,
        model: &str,
        page: PageRequest,
    ) -> EmbeddingResult<Vec<Embedding>> {
        check_page(&page)?;
        self.repository
            .find_needing_reprocessing(older_than, model, page)
            .await
    }

    /// Records that have no vector yet, oldest first
    pub async fn find_without_vector(&self, page: PageRequest) -> EmbeddingResult<Vec<Embedding>> {
        check_page(&page)?;
        self.repository.find_without_vector(page).await
    }

    /// Delete every record created before `cutoff`
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> EmbeddingResult<u64> {
        let removed = self.repository.delete_older_than(cutoff).await?;
        tracing::info!(%cutoff, removed, "Purged old embeddings");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::repository::MockEmbeddingRepository;
    use chrono::Duration;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_purge_delegates_to_repository() {
        let cutoff = Utc::now() - Duration::days(90);
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo
            .expect_delete_older_than()
            .with(eq(cutoff))
            .times(1)
            .returning(|_| Ok(7));

        let jobs = MaintenanceJobs::new(Arc::new(mock_repo));
        assert_eq!(jobs.purge_older_than(cutoff).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_zero_page_limit_is_rejected() {
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo.expect_find_without_vector().never();
        mock_repo.expect_find_needing_reprocessing().never();

        let jobs = MaintenanceJobs::new(Arc::new(mock_repo));
        let result = jobs.find_without_vector(PageRequest::new(0, 0)).await;
        assert!(matches!(result, Err(EmbeddingError::Validation(_))));

        let result = jobs
            .find_needing_reprocessing(Utc::now(), "text-embedding-ada-002", PageRequest::new(0, 0))
            .await;
        assert!(matches!(result, Err(EmbeddingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reprocessing_passes_page_through() {
        let page = PageRequest::new(25, 50);
        let mut mock_repo = MockEmbeddingRepository::new();
        mock_repo
            .expect_find_needing_reprocessing()
            .withf(move |_, model, p| model == "text-embedding-3-small" && *p == page)
            .times(1)
            .returning(|_, _, _| Ok(vec![]));

        let jobs = MaintenanceJobs::new(Arc::new(mock_repo));
        let found = jobs
            .find_needing_reprocessing(Utc::now(), "text-embedding-3-small", page)
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
