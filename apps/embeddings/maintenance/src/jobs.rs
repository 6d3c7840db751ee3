//! Maintenance operations behind each subcommand

use chrono::{DateTime, Duration, Utc};
use domain_embeddings::{
    ContentType, Embedding, EmbeddingRepository, EmbeddingService, PageRequest,
};
use eyre::{Result, bail};
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ContentTypeRow {
    pub content_type: ContentType,
    pub total: u64,
    pub with_vector: u64,
    pub vector_ratio: f64,
}

#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub total: u64,
    pub with_vector: u64,
    pub content_types: Vec<ContentTypeRow>,
}

#[derive(Debug, Serialize)]
pub struct PurgeReport {
    pub cutoff: DateTime<Utc>,
    pub removed: u64,
}

#[derive(Debug, Serialize)]
pub struct BacklogEntry {
    pub id: Uuid,
    pub content_id: Uuid,
    pub content_type: ContentType,
    pub chunk: String,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Embedding> for BacklogEntry {
    fn from(embedding: &Embedding) -> Self {
        Self {
            id: embedding.id,
            content_id: embedding.content_id,
            content_type: embedding.content_type,
            chunk: embedding.chunk_position(),
            embedding_model: embedding.embedding_model.clone(),
            created_at: embedding.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BacklogReport {
    pub model: String,
    pub cutoff: Option<DateTime<Utc>>,
    pub without_vector: Vec<BacklogEntry>,
    pub needing_reprocessing: Vec<BacklogEntry>,
}

/// `now - days`, rejecting a zero retention
pub fn cutoff_for(days: u32, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if days == 0 {
        bail!("retention must be at least one day");
    }
    Ok(now - Duration::days(i64::from(days)))
}

pub struct MaintenanceRunner<R: EmbeddingRepository> {
    service: EmbeddingService<R>,
}

impl<R: EmbeddingRepository + 'static> MaintenanceRunner<R> {
    pub fn new(service: EmbeddingService<R>) -> Self {
        Self { service }
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let stats = self.service.statistics().await?;

        let content_types: Vec<ContentTypeRow> = stats
            .iter()
            .map(|s| ContentTypeRow {
                content_type: s.content_type,
                total: s.total,
                with_vector: s.with_vector,
                vector_ratio: s.vector_ratio(),
            })
            .collect();

        Ok(StoreStats {
            total: stats.iter().map(|s| s.total).sum(),
            with_vector: stats.iter().map(|s| s.with_vector).sum(),
            content_types,
        })
    }

    pub async fn purge(&self, older_than_days: u32) -> Result<PurgeReport> {
        let cutoff = cutoff_for(older_than_days, Utc::now())?;
        let removed = self.service.maintenance().purge_older_than(cutoff).await?;
        Ok(PurgeReport { cutoff, removed })
    }

    /// Records without vectors, plus records embedded with `model` before the cutoff
    pub async fn backlog(
        &self,
        model: Option<String>,
        older_than_days: Option<u32>,
        limit: u64,
    ) -> Result<BacklogReport> {
        let model = model.unwrap_or_else(|| self.service.config().default_model.clone());
        let page = PageRequest::first(limit);
        let jobs = self.service.maintenance();

        let without_vector = jobs.find_without_vector(page).await?;

        let cutoff = older_than_days
            .map(|days| cutoff_for(days, Utc::now()))
            .transpose()?;
        let needing_reprocessing = match cutoff {
            Some(cutoff) => jobs.find_needing_reprocessing(cutoff, &model, page).await?,
            None => Vec::new(),
        };

        Ok(BacklogReport {
            model,
            cutoff,
            without_vector: without_vector.iter().map(BacklogEntry::from).collect(),
            needing_reprocessing: needing_reprocessing.iter().map(BacklogEntry::from).collect(),
        })
    }

    /// Purge on every tick of `cron_expr` until the process is stopped
    pub async fn run_scheduled(&self, cron_expr: &str, retention_days: u32) -> Result<()> {
        cutoff_for(retention_days, Utc::now())?;
        info!(cron = cron_expr, retention_days, "Starting scheduled purge");

        let sched = JobScheduler::new().await?;
        let jobs = self.service.maintenance();

        let job = Job::new_async(cron_expr, move |_uuid, _l| {
            let jobs = jobs.clone();

            Box::pin(async move {
                let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
                match jobs.purge_older_than(cutoff).await {
                    Ok(removed) => info!(removed, "Scheduled purge complete"),
                    Err(e) => error!(error = %e, "Scheduled purge failed"),
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler started, waiting for jobs...");
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
        }
    }
}
