//! Configuration for the maintenance runner

use core_config::{Environment, FromEnv};
use database::postgres::PostgresConfig;
use domain_embeddings::EmbeddingStoreConfig;
use eyre::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database: PostgresConfig,
    pub store: EmbeddingStoreConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            environment: Environment::from_env(),
            database: PostgresConfig::from_env()?,
            store: EmbeddingStoreConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_database_url() {
        temp_env::with_vars([("DATABASE_URL", None::<&str>)], || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("DATABASE_URL"));
        });
    }

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("APP_ENV", Some("production")),
                ("DATABASE_URL", Some("postgresql://localhost/embeddings")),
                ("DB_MAX_CONNECTIONS", Some("4")),
                ("DB_MIN_CONNECTIONS", None),
                ("EMBEDDING_DEFAULT_MODEL", Some("text-embedding-3-small")),
                ("EMBEDDING_EXTRA_MODELS", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert!(config.environment.is_production());
                assert_eq!(config.database.max_connections, 4);
                assert_eq!(config.store.default_model, "text-embedding-3-small");
            },
        );
    }
}
