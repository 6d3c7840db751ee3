//! Similarity scoring and result shaping.
//!
//! The PostgreSQL engine scores with pgvector's cosine distance; the helpers
//! here produce the same numbers for the in-memory engine and put any set of
//! scored hits into the canonical order.

use std::cmp::Ordering;

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::models::{NearestQuery, ScoredEmbedding, SimilarityQuery};

/// Cosine similarity computed in f64. A zero-norm side scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Highest score first, ties broken by ascending id
pub fn rank(hits: &mut [ScoredEmbedding]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.embedding.id.cmp(&b.embedding.id))
    });
}

/// Drop hits below `threshold`, rank the rest and keep the best `limit`
pub fn shape_results(
    mut hits: Vec<ScoredEmbedding>,
    threshold: f64,
    limit: u64,
) -> Vec<ScoredEmbedding> {
    hits.retain(|hit| hit.score >= threshold);
    rank(&mut hits);
    hits.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    hits
}

/// Check a similarity query and resolve it against the model in scope.
///
/// `dimension_of` returns the declared dimension of a model, `None` if unknown.
pub fn resolve_query(
    query: SimilarityQuery,
    default_model: &str,
    max_limit: u64,
    dimension_of: impl Fn(&str) -> Option<usize>,
) -> EmbeddingResult<NearestQuery> {
    let model = query
        .embedding_model
        .unwrap_or_else(|| default_model.to_string());

    let dimension = dimension_of(&model)
        .ok_or_else(|| EmbeddingError::InvalidQuery(format!("unknown embedding model '{model}'")))?;

    if query.vector.len() != dimension {
        return Err(EmbeddingError::InvalidQuery(format!(
            "query vector has {} dimensions, model '{model}' expects {dimension}",
            query.vector.len()
        )));
    }
    if query.vector.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::InvalidQuery(
            "query vector contains non-finite values".to_string(),
        ));
    }
    if query.limit == 0 || query.limit > max_limit {
        return Err(EmbeddingError::InvalidQuery(format!(
            "limit must be between 1 and {max_limit}, got {}",
            query.limit
        )));
    }
    if !query.threshold.is_finite() || !(-1.0..=1.0).contains(&query.threshold) {
        return Err(EmbeddingError::InvalidQuery(format!(
            "threshold must be within [-1, 1], got {}",
            query.threshold
        )));
    }

    Ok(NearestQuery {
        vector: query.vector,
        embedding_model: model,
        content_type: query.content_type,
        threshold: query.threshold,
        limit: query.limit,
    })
}
