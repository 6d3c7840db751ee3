//! Text codec for embedding vectors.
//!
//! Vectors are persisted in the bracketed literal form accepted by pgvector
//! (`[0.1,0.2,0.3]`), which keeps stored values readable and portable across
//! engines that understand the same literal syntax.

use thiserror::Error;

/// Reasons a stored vector literal could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("vector literal must start with '['")]
    MissingOpenBracket,

    #[error("vector literal must end with ']'")]
    MissingCloseBracket,

    #[error("unexpected bracket at position {0}")]
    UnbalancedBracket(usize),

    #[error("empty element at index {0}")]
    EmptyElement(usize),

    #[error("element {index} is not a number: '{token}'")]
    InvalidNumber { index: usize, token: String },

    #[error("element {0} is not finite")]
    NonFinite(usize),
}

/// Encode a vector as `[v0,v1,...]`.
///
/// Uses Rust's shortest round-trip float formatting, so
/// `decode(&encode(v)) == v` for every finite `v`.
pub fn encode(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 12 + 2);
    out.push('[');
    for (i, value) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&value.to_string());
    }
    out.push(']');
    out
}

/// Decode a vector literal, rejecting anything malformed instead of truncating.
pub fn decode(text: &str) -> Result<Vec<f32>, DecodeError> {
    let trimmed = text.trim();

    let inner = trimmed
        .strip_prefix('[')
        .ok_or(DecodeError::MissingOpenBracket)?
        .strip_suffix(']')
        .ok_or(DecodeError::MissingCloseBracket)?;

    if let Some(pos) = inner.find(['[', ']']) {
        // +1 accounts for the stripped opening bracket
        return Err(DecodeError::UnbalancedBracket(pos + 1));
    }

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .enumerate()
        .map(|(index, raw)| {
            let token = raw.trim();
            if token.is_empty() {
                return Err(DecodeError::EmptyElement(index));
            }
            let value: f32 = token.parse().map_err(|_| DecodeError::InvalidNumber {
                index,
                token: token.to_string(),
            })?;
            if !value.is_finite() {
                return Err(DecodeError::NonFinite(index));
            }
            Ok(value)
        })
        .collect()
}

/// Number of elements in a stored vector literal.
///
/// `None` means "no vector": the literal is absent or cannot be decoded.
pub fn dimensions(text: Option<&str>) -> Option<usize> {
    text.and_then(|t| decode(t).ok()).map(|v| v.len())
}

/// Whether a stored literal holds a usable vector: decodable and non-empty
pub fn is_present(text: Option<&str>) -> bool {
    dimensions(text).is_some_and(|dims| dims > 0)
}
