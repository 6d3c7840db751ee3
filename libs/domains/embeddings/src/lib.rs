//! Embeddings Domain
//!
//! Persistent store for vector embeddings of content items: project
//! descriptions, documentation, code snippets, comments and so on. Long content
//! is split into ordered chunks, each chunk carries its own vector, and
//! records can be searched by cosine similarity.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │     Service      │  ← Validation, chunking, search resolution
//! │  MaintenanceJobs │  ← Reprocessing discovery, purging
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │    Repository    │  ← Data access (trait + Postgres/in-memory)
//! └────────┬─────────┘
//!          │
//! ┌────────▼─────────┐
//! │  Models / Codec  │  ← Records, queries, vector text format
//! └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_embeddings::{
//!     ContentDocument, ContentType, EmbeddingService, InMemoryEmbeddingRepository,
//!     SimilarityQuery,
//! };
//! use uuid::Uuid;
//!
//! # async fn run() -> domain_embeddings::EmbeddingResult<()> {
//! let service = EmbeddingService::new(InMemoryEmbeddingRepository::new());
//!
//! let content_id = Uuid::now_v7();
//! service
//!     .store_document(ContentDocument::new(
//!         content_id,
//!         ContentType::ProjectDocumentation,
//!         "Getting started...",
//!     ))
//!     .await?;
//!
//! let hits = service
//!     .search(SimilarityQuery::new(vec![0.0; 1536]).with_threshold(0.8))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod codec;
pub mod config;
pub mod entity;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod postgres;
pub mod provider;
pub mod repository;
pub mod search;
pub mod service;

// Re-export commonly used types
pub use config::{EmbeddingModel, EmbeddingStoreConfig, ModelRegistry};
pub use error::{EmbeddingError, EmbeddingResult};
pub use maintenance::MaintenanceJobs;
pub use models::{
    ContentDocument, ContentType, ContentTypeStats, Embedding, EmbeddingFilter, Metadata,
    NewEmbedding, PageRequest, ReassembledContent, ScoredEmbedding, SimilarityQuery,
    DEFAULT_EMBEDDING_MODEL,
};
pub use postgres::PgEmbeddingRepository;
pub use provider::EmbeddingProvider;
pub use repository::{EmbeddingRepository, InMemoryEmbeddingRepository};
pub use service::EmbeddingService;
