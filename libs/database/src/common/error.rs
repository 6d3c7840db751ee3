/// Error type for health checks
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Errors reported by SeaORM / the PostgreSQL driver
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sea_orm::DbErr),

    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// A PostgreSQL extension the schema relies on is not installed
    #[error("Required extension '{0}' is not installed")]
    MissingExtension(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
