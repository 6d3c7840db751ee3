use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tracing::debug;

use crate::common::DatabaseError;

/// Verify the connection answers `SELECT 1`
pub async fn check_health(db: &DatabaseConnection) -> Result<(), DatabaseError> {
    let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());
    db.query_one_raw(stmt)
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(e.to_string()))?;

    debug!("PostgreSQL health check passed");
    Ok(())
}

/// Verify that `extension` is installed in the current database
pub async fn check_extension(
    db: &DatabaseConnection,
    extension: &str,
) -> Result<(), DatabaseError> {
    let stmt = Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        "SELECT 1 FROM pg_extension WHERE extname = $1",
        [extension.into()],
    );
    let row = db
        .query_one_raw(stmt)
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(e.to_string()))?;

    match row {
        Some(_) => Ok(()),
        None => Err(DatabaseError::MissingExtension(extension.to_string())),
    }
}

/// Outcome of a detailed health check
#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus {
    pub healthy: bool,
    /// Whether pgvector is available
    pub vector_extension: bool,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthStatus {
    pub fn healthy(vector_extension: bool, response_time_ms: u64) -> Self {
        Self {
            healthy: true,
            vector_extension,
            message: None,
            response_time_ms,
        }
    }

    pub fn unhealthy(message: String, response_time_ms: u64) -> Self {
        Self {
            healthy: false,
            vector_extension: false,
            message: Some(message),
            response_time_ms,
        }
    }
}

/// Connectivity plus pgvector availability, with timing
pub async fn check_health_detailed(db: &DatabaseConnection) -> HealthStatus {
    let start = std::time::Instant::now();

    let result = match check_health(db).await {
        Ok(()) => match check_extension(db, "vector").await {
            Ok(()) => Ok(true),
            Err(DatabaseError::MissingExtension(_)) => Ok(false),
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    let elapsed = start.elapsed().as_millis() as u64;
    match result {
        Ok(vector_extension) => HealthStatus::healthy(vector_extension, elapsed),
        Err(e) => HealthStatus::unhealthy(e.to_string(), elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_healthy() {
        let status = HealthStatus::healthy(true, 42);
        assert!(status.healthy);
        assert!(status.vector_extension);
        assert_eq!(status.response_time_ms, 42);
        assert!(status.message.is_none());
    }

    #[test]
    fn test_health_status_unhealthy() {
        let status = HealthStatus::unhealthy("connection refused".to_string(), 100);
        assert!(!status.healthy);
        assert!(!status.vector_extension);
        assert_eq!(status.message.as_deref(), Some("connection refused"));
    }
}
