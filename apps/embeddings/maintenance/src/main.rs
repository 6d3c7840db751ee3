//! Embeddings Maintenance
//!
//! Job runner for the embedding store: applies migrations, reports statistics,
//! purges old records and lists records that need (re-)embedding. Can run a
//! single job or purge on a cron schedule.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_embeddings::{EmbeddingService, PgEmbeddingRepository};
use eyre::Result;
use serde::Serialize;
use tracing::info;

mod config;
mod jobs;

use config::Config;
use jobs::MaintenanceRunner;

#[derive(Parser)]
#[command(name = "embeddings-maintenance")]
#[command(about = "Maintenance jobs for the embedding store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Show database health and per-content-type counts
    Stats,

    /// Delete records created more than N days ago
    Purge {
        #[arg(long)]
        older_than_days: u32,
    },

    /// List records without vectors and records due for re-embedding
    Backlog {
        /// Model whose records are checked for reprocessing. Defaults to the configured model.
        #[arg(short, long)]
        model: Option<String>,

        /// Only report reprocessing candidates created more than N days ago
        #[arg(long)]
        older_than_days: Option<u32>,

        #[arg(short, long, default_value_t = 50)]
        limit: u64,
    },

    /// Purge old records on a cron schedule
    Schedule {
        /// Cron expression for scheduling (default: daily at 03:00)
        #[arg(short, long, default_value = "0 0 3 * * *")]
        cron: String,

        #[arg(long)]
        retention_days: u32,
    },
}

#[derive(Serialize)]
struct StatsOutput {
    healthy: bool,
    vector_extension: bool,
    response_time_ms: u64,
    pending_migrations: Vec<String>,
    store: jobs::StoreStats,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let cli = Cli::parse();

    info!("Connecting to database...");
    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("Database connection failed: {}", e))?;

    let repository = PgEmbeddingRepository::new(db.clone());
    let runner = MaintenanceRunner::new(EmbeddingService::with_config(
        repository,
        config.store.clone(),
    ));

    match cli.command {
        Commands::Migrate => {
            database::postgres::run_migrations::<migration::Migrator>(&db, "embeddings").await?;
        }

        Commands::Stats => {
            let health = database::postgres::check_health_detailed(&db).await;
            if !health.healthy {
                eyre::bail!(
                    "Database unhealthy: {}",
                    health.message.unwrap_or_default()
                );
            }
            let pending = database::postgres::pending_migrations::<migration::Migrator>(&db).await?;

            print_json(&StatsOutput {
                healthy: health.healthy,
                vector_extension: health.vector_extension,
                response_time_ms: health.response_time_ms,
                pending_migrations: pending,
                store: runner.stats().await?,
            })?;
        }

        Commands::Purge { older_than_days } => {
            let report = runner.purge(older_than_days).await?;
            info!(removed = report.removed, cutoff = %report.cutoff, "Purge complete");
            print_json(&report)?;
        }

        Commands::Backlog {
            model,
            older_than_days,
            limit,
        } => {
            let report = runner.backlog(model, older_than_days, limit).await?;
            print_json(&report)?;
        }

        Commands::Schedule {
            cron,
            retention_days,
        } => {
            runner.run_scheduled(&cron, retention_days).await?;
        }
    }

    Ok(())
}
