use std::collections::HashMap;

use core_config::{env_or_default, env_parse, ConfigError, FromEnv};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::models::DEFAULT_EMBEDDING_MODEL;

/// Embedding models known out of the box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter)]
pub enum EmbeddingModel {
    // OpenAI
    /// text-embedding-ada-002 (1536 dimensions, legacy)
    #[default]
    TextEmbeddingAda002,
    /// text-embedding-3-small (1536 dimensions)
    TextEmbedding3Small,
    /// text-embedding-3-large (3072 dimensions)
    TextEmbedding3Large,

    // Vertex AI
    /// text-embedding-004 (768 dimensions)
    TextEmbedding004,

    // Cohere
    /// embed-english-v3.0 (1024 dimensions)
    CohereEmbedV3,

    // Voyage AI
    /// voyage-3 (1024 dimensions)
    Voyage3,
    /// voyage-3-lite (512 dimensions)
    Voyage3Lite,
}

impl EmbeddingModel {
    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingModel::TextEmbeddingAda002 => 1536,
            EmbeddingModel::TextEmbedding3Small => 1536,
            EmbeddingModel::TextEmbedding3Large => 3072,
            EmbeddingModel::TextEmbedding004 => 768,
            EmbeddingModel::CohereEmbedV3 => 1024,
            EmbeddingModel::Voyage3 => 1024,
            EmbeddingModel::Voyage3Lite => 512,
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self {
            EmbeddingModel::TextEmbeddingAda002 => "text-embedding-ada-002",
            EmbeddingModel::TextEmbedding3Small => "text-embedding-3-small",
            EmbeddingModel::TextEmbedding3Large => "text-embedding-3-large",
            EmbeddingModel::TextEmbedding004 => "text-embedding-004",
            EmbeddingModel::CohereEmbedV3 => "embed-english-v3.0",
            EmbeddingModel::Voyage3 => "voyage-3",
            EmbeddingModel::Voyage3Lite => "voyage-3-lite",
        }
    }
}

/// Model name to vector dimension lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    dimensions: HashMap<String, usize>,
}

impl ModelRegistry {
    /// Registry without any models
    pub fn empty() -> Self {
        Self {
            dimensions: HashMap::new(),
        }
    }

    /// Register (or redefine) a model
    pub fn register(&mut self, name: impl Into<String>, dimension: usize) -> &mut Self {
        self.dimensions.insert(name.into(), dimension);
        self
    }

    pub fn with_model(mut self, name: impl Into<String>, dimension: usize) -> Self {
        self.register(name, dimension);
        self
    }

    pub fn dimension_of(&self, model: &str) -> Option<usize> {
        self.dimensions.get(model).copied()
    }

    pub fn contains(&self, model: &str) -> bool {
        self.dimensions.contains_key(model)
    }

    /// Registered model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dimensions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Parse `name=dim,name=dim` pairs
    pub fn parse_extra(raw: &str) -> Result<Vec<(String, usize)>, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (name, dim) = entry
                    .split_once('=')
                    .ok_or_else(|| format!("expected name=dimension, got '{entry}'"))?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(format!("missing model name in '{entry}'"));
                }
                let dim: usize = dim
                    .trim()
                    .parse()
                    .map_err(|e| format!("invalid dimension in '{entry}': {e}"))?;
                if dim == 0 {
                    return Err(format!("dimension must be positive in '{entry}'"));
                }
                Ok((name.to_string(), dim))
            })
            .collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for model in EmbeddingModel::iter() {
            registry.register(model.model_name(), model.dimension());
        }
        registry
    }
}

/// Settings for the embedding store
#[derive(Debug, Clone)]
pub struct EmbeddingStoreConfig {
    pub default_model: String,
    pub max_chunk_chars: usize,
    pub max_search_limit: u64,
    pub models: ModelRegistry,
}

impl EmbeddingStoreConfig {
    pub fn default_dimension(&self) -> Option<usize> {
        self.models.dimension_of(&self.default_model)
    }
}

impl Default for EmbeddingStoreConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            max_chunk_chars: 4000,
            max_search_limit: 100,
            models: ModelRegistry::default(),
        }
    }
}

fn parse_positive<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let value: T = env_parse(key, default)?;
    if value == T::default() {
        return Err(ConfigError::ParseError {
            key: key.to_string(),
            details: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

impl FromEnv for EmbeddingStoreConfig {
    /// Reads from environment variables:
    /// - EMBEDDING_DEFAULT_MODEL: defaults to text-embedding-ada-002
    /// - EMBEDDING_MAX_CHUNK_CHARS: defaults to 4000
    /// - EMBEDDING_MAX_SEARCH_LIMIT: defaults to 100
    /// - EMBEDDING_EXTRA_MODELS: extra models as `name=dim,name=dim`
    fn from_env() -> Result<Self, ConfigError> {
        let default_model = env_or_default("EMBEDDING_DEFAULT_MODEL", DEFAULT_EMBEDDING_MODEL);
        let max_chunk_chars = parse_positive("EMBEDDING_MAX_CHUNK_CHARS", "4000")?;
        let max_search_limit = parse_positive("EMBEDDING_MAX_SEARCH_LIMIT", "100")?;

        let mut models = ModelRegistry::default();
        let extra = env_or_default("EMBEDDING_EXTRA_MODELS", "");
        for (name, dim) in
            ModelRegistry::parse_extra(&extra).map_err(|details| ConfigError::ParseError {
                key: "EMBEDDING_EXTRA_MODELS".to_string(),
                details,
            })?
        {
            models.register(name, dim);
        }

        if !models.contains(&default_model) {
            return Err(ConfigError::ParseError {
                key: "EMBEDDING_DEFAULT_MODEL".to_string(),
                details: format!("unknown model '{default_model}'"),
            });
        }

        Ok(Self {
            default_model,
            max_chunk_chars,
            max_search_limit,
            models,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 4] = [
        "EMBEDDING_DEFAULT_MODEL",
        "EMBEDDING_MAX_CHUNK_CHARS",
        "EMBEDDING_MAX_SEARCH_LIMIT",
        "EMBEDDING_EXTRA_MODELS",
    ];

    #[test]
    fn test_registry_defaults() {
        let registry = ModelRegistry::default();
        assert_eq!(registry.dimension_of("text-embedding-ada-002"), Some(1536));
        assert_eq!(registry.dimension_of("text-embedding-3-large"), Some(3072));
        assert_eq!(registry.dimension_of("voyage-3-lite"), Some(512));
        assert_eq!(registry.dimension_of("unknown"), None);
        assert_eq!(registry.model_names().len(), EmbeddingModel::iter().count());
    }

    #[test]
    fn test_parse_extra_models() {
        let parsed = ModelRegistry::parse_extra(" local-mini=384 , tiny=3").unwrap();
        assert_eq!(
            parsed,
            vec![("local-mini".to_string(), 384), ("tiny".to_string(), 3)]
        );
        assert!(ModelRegistry::parse_extra("").unwrap().is_empty());
        assert!(ModelRegistry::parse_extra("broken").is_err());
        assert!(ModelRegistry::parse_extra("=3").is_err());
        assert!(ModelRegistry::parse_extra("x=abc").is_err());
        assert!(ModelRegistry::parse_extra("x=0").is_err());
    }

    #[test]
    fn test_config_from_env_defaults() {
        temp_env::with_vars(VARS.map(|k| (k, None::<&str>)), || {
            let config = EmbeddingStoreConfig::from_env().unwrap();
            assert_eq!(config.default_model, "text-embedding-ada-002");
            assert_eq!(config.max_chunk_chars, 4000);
            assert_eq!(config.max_search_limit, 100);
            assert_eq!(config.default_dimension(), Some(1536));
        });
    }

    #[test]
    fn test_config_from_env_overrides() {
        temp_env::with_vars(
            [
                ("EMBEDDING_DEFAULT_MODEL", Some("local-mini")),
                ("EMBEDDING_MAX_CHUNK_CHARS", Some("512")),
                ("EMBEDDING_MAX_SEARCH_LIMIT", Some("25")),
                ("EMBEDDING_EXTRA_MODELS", Some("local-mini=384")),
            ],
            || {
                let config = EmbeddingStoreConfig::from_env().unwrap();
                assert_eq!(config.default_model, "local-mini");
                assert_eq!(config.max_chunk_chars, 512);
                assert_eq!(config.max_search_limit, 25);
                assert_eq!(config.default_dimension(), Some(384));
            },
        );
    }

    #[test]
    fn test_config_rejects_invalid_numbers() {
        temp_env::with_vars(
            [
                ("EMBEDDING_DEFAULT_MODEL", None),
                ("EMBEDDING_MAX_CHUNK_CHARS", Some("lots")),
                ("EMBEDDING_MAX_SEARCH_LIMIT", None),
                ("EMBEDDING_EXTRA_MODELS", None),
            ],
            || {
                let err = EmbeddingStoreConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("EMBEDDING_MAX_CHUNK_CHARS"));
            },
        );

        temp_env::with_vars(
            [
                ("EMBEDDING_DEFAULT_MODEL", None),
                ("EMBEDDING_MAX_CHUNK_CHARS", None),
                ("EMBEDDING_MAX_SEARCH_LIMIT", Some("0")),
                ("EMBEDDING_EXTRA_MODELS", None),
            ],
            || {
                let err = EmbeddingStoreConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("EMBEDDING_MAX_SEARCH_LIMIT"));
            },
        );
    }

    #[test]
    fn test_config_rejects_unknown_default_model() {
        temp_env::with_vars(
            [
                ("EMBEDDING_DEFAULT_MODEL", Some("mystery-model")),
                ("EMBEDDING_MAX_CHUNK_CHARS", None),
                ("EMBEDDING_MAX_SEARCH_LIMIT", None),
                ("EMBEDDING_EXTRA_MODELS", None),
            ],
            || {
                let err = EmbeddingStoreConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("mystery-model"));
            },
        );
    }
}
