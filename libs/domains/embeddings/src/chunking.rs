//! Splitting long content into ordered chunks and putting chunk sets back together.
//!
//! Chunk lengths are measured in characters. Concatenating the chunk texts of a
//! split always yields the original text.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::models::{ContentType, Embedding, NewEmbedding, ReassembledContent};

/// One piece of a split document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: u32,
    pub total: u32,
    pub text: String,
}

/// Anything that occupies a slot in a chunk set
pub trait ChunkSlot {
    fn content_id(&self) -> Uuid;
    fn content_type(&self) -> ContentType;
    fn chunk_index(&self) -> u32;
    fn chunk_total(&self) -> u32;
}

impl ChunkSlot for Embedding {
    fn content_id(&self) -> Uuid {
        self.content_id
    }
    fn content_type(&self) -> ContentType {
        self.content_type
    }
    fn chunk_index(&self) -> u32 {
        self.chunk_index
    }
    fn chunk_total(&self) -> u32 {
        self.chunk_total
    }
}

impl ChunkSlot for NewEmbedding {
    fn content_id(&self) -> Uuid {
        self.content_id
    }
    fn content_type(&self) -> ContentType {
        self.content_type
    }
    fn chunk_index(&self) -> u32 {
        self.chunk_index
    }
    fn chunk_total(&self) -> u32 {
        self.chunk_total
    }
}

const SENTENCE_ENDS: [&str; 3] = [". ", "! ", "? "];

/// Byte offset where the current window should be cut
fn break_point(window: &str) -> usize {
    if let Some(pos) = window.rfind("\n\n") {
        return pos + 2;
    }
    if let Some(pos) = window.rfind('\n') {
        return pos + 1;
    }
    if let Some(pos) = SENTENCE_ENDS.iter().filter_map(|end| window.rfind(end)).max() {
        return pos + 2;
    }
    if let Some((pos, ch)) = window.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
        return pos + ch.len_utf8();
    }
    window.len()
}

/// Split `text` into chunks of at most `max_chunk_chars` characters.
///
/// Cuts prefer, in order: paragraph break, line break, sentence end, any
/// whitespace. The separator stays with the chunk before the cut. Without any
/// boundary the text is hard-split at the limit.
pub fn split(text: &str, max_chunk_chars: usize) -> EmbeddingResult<Vec<Chunk>> {
    if max_chunk_chars == 0 {
        return Err(EmbeddingError::Validation(
            "max_chunk_chars must be at least 1".to_string(),
        ));
    }
    if text.is_empty() {
        return Err(EmbeddingError::Validation(
            "cannot split empty content".to_string(),
        ));
    }

    let mut pieces: Vec<&str> = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let window_end = match rest.char_indices().nth(max_chunk_chars) {
            Some((offset, _)) => offset,
            None => {
                pieces.push(rest);
                break;
            }
        };
        let cut = break_point(&rest[..window_end]);
        let (piece, tail) = rest.split_at(cut);
        pieces.push(piece);
        rest = tail;
    }

    let total = pieces.len() as u32;
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| Chunk {
            index: index as u32,
            total,
            text: piece.to_string(),
        })
        .collect())
}

/// Describe what is wrong with a chunk set's layout, `None` when it is complete
pub fn layout_problem<T: ChunkSlot>(
    content_id: Uuid,
    content_type: ContentType,
    slots: &[T],
) -> Option<String> {
    if let Some(foreign) = slots
        .iter()
        .find(|s| s.content_id() != content_id || s.content_type() != content_type)
    {
        return Some(format!(
            "chunk {} belongs to {} content {}",
            foreign.chunk_index(),
            foreign.content_type(),
            foreign.content_id()
        ));
    }

    let total = slots.first().map(ChunkSlot::chunk_total).unwrap_or_default();
    if total == 0 {
        return Some("chunk total must be at least 1".to_string());
    }
    if slots.iter().any(|s| s.chunk_total() != total) {
        return Some("chunks disagree on chunk_total".to_string());
    }

    let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
    for slot in slots {
        *seen.entry(slot.chunk_index()).or_default() += 1;
    }

    let out_of_range: Vec<u32> = seen.keys().copied().filter(|i| *i >= total).collect();
    let missing: Vec<u32> = (0..total).filter(|i| !seen.contains_key(i)).collect();
    let duplicate: Vec<u32> = seen
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(index, _)| *index)
        .collect();

    if out_of_range.is_empty() && missing.is_empty() && duplicate.is_empty() {
        return None;
    }

    let mut problems = vec![format!("expected {total} chunks")];
    if !missing.is_empty() {
        problems.push(format!("missing {missing:?}"));
    }
    if !duplicate.is_empty() {
        problems.push(format!("duplicate {duplicate:?}"));
    }
    if !out_of_range.is_empty() {
        problems.push(format!("out of range {out_of_range:?}"));
    }
    Some(problems.join(", "))
}

/// Order a fetched chunk set by index, failing if it is not complete.
pub fn reassemble(
    content_id: Uuid,
    content_type: ContentType,
    mut records: Vec<Embedding>,
) -> EmbeddingResult<Vec<Embedding>> {
    if records.is_empty() {
        return Err(EmbeddingError::ContentNotFound {
            content_id,
            content_type,
        });
    }

    if let Some(details) = layout_problem(content_id, content_type, &records) {
        return Err(EmbeddingError::IncompleteChunkSet {
            content_id,
            content_type,
            details,
        });
    }

    records.sort_by_key(|r| r.chunk_index);
    Ok(records)
}

/// Join chunk texts in the order given
pub fn reconstruct_text(chunks: &[Embedding]) -> String {
    chunks.iter().map(|c| c.content_text.as_str()).collect()
}

/// Reassemble a chunk set and rebuild its full text
pub fn reconstruct(
    content_id: Uuid,
    content_type: ContentType,
    records: Vec<Embedding>,
) -> EmbeddingResult<ReassembledContent> {
    let chunks = reassemble(content_id, content_type, records)?;
    let text = reconstruct_text(&chunks);
    Ok(ReassembledContent {
        content_id,
        content_type,
        chunks,
        text,
    })
}

/// "{index+1}/{total}", or "1/1" for single-chunk content
pub fn chunk_position(index: u32, total: u32) -> String {
    if total <= 1 {
        "1/1".to_string()
    } else {
        format!("{}/{}", index + 1, total)
    }
}
