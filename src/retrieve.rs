//! Cosine top-k retrieval and citation-bearing context assembly.
//!
//! Query time is a pure read: score every indexed chunk against the query
//! embedding, rank descending, keep the best `k`, then pack whole chunks
//! into a character-budgeted context block with stable `[#N]` citation
//! markers. Nothing here mutates the index or performs I/O.
//!
//! An empty index and an empty context are ordinary outcomes, not errors:
//! the caller renders them as the fixed refusal answer instead of
//! fabricating one.

use crate::error::RetrievalError;
use crate::index::ChunkIndex;
use crate::models::{DocumentChunk, ScoredChunk};

/// Denominator stabilizer so all-zero vectors score near zero instead of
/// dividing by zero.
const COSINE_EPSILON: f32 = 1e-8;

/// Cosine similarity of two embedding vectors.
///
/// Returns a value in roughly `[-1.0, 1.0]`: `1` for identical direction,
/// `0` for orthogonal, `-1` for opposite. Vectors of different lengths are
/// compared over the shorter prefix; the ingestion and query paths reject
/// ragged dimensionality before it can reach this function, so the prefix
/// case only arises when callers use this helper directly on degenerate
/// input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt() + COSINE_EPSILON)
}

/// Rank every indexed chunk against `query` and return the best `k`.
///
/// Results are sorted by descending score; ties keep insertion order (the
/// sort is stable), so repeated calls over the same index are
/// deterministic. Fewer than `k` chunks indexed means fewer results; an
/// empty index means an empty vector.
///
/// # Errors
///
/// - `InvalidArgument` for `k == 0` or an empty query vector.
/// - `DimensionMismatch` when the query's length differs from the index's
///   dimensionality.
pub fn top_k(
    index: &ChunkIndex,
    query: &[f32],
    k: usize,
) -> Result<Vec<ScoredChunk>, RetrievalError> {
    if k == 0 {
        return Err(RetrievalError::InvalidArgument(
            "k must be > 0".to_string(),
        ));
    }
    if query.is_empty() {
        return Err(RetrievalError::InvalidArgument(
            "query embedding must not be empty".to_string(),
        ));
    }

    let snapshot = index.snapshot();
    if let Some(first) = snapshot.first() {
        if first.embedding.len() != query.len() {
            return Err(RetrievalError::DimensionMismatch {
                expected: first.embedding.len(),
                actual: query.len(),
            });
        }
    }

    let mut scored: Vec<ScoredChunk> = snapshot
        .iter()
        .map(|chunk| ScoredChunk {
            chunk: chunk.clone(),
            score: cosine_similarity(query, &chunk.embedding),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);

    Ok(scored)
}

/// The assembled grounding context for one question.
#[derive(Debug, Clone)]
pub struct ContextBlock {
    /// Citation-marked context text handed to the answer generator. Empty
    /// when nothing fit the budget.
    pub text: String,
    /// The chunks actually included, in rank order.
    pub used: Vec<DocumentChunk>,
}

/// Pack ranked chunks into a context block of at most `max_chars`
/// characters.
///
/// Each chunk is rendered as a block headed by its rank marker and source
/// label, and blocks are joined by blank lines. Chunks are included whole,
/// greedily in rank order; the first chunk that would push the running
/// total past the budget is dropped along with everything ranked below it.
/// A cited block is therefore always a complete chunk, and the output never
/// exceeds the budget.
pub fn build_context(
    ranked: &[ScoredChunk],
    max_chars: usize,
) -> Result<ContextBlock, RetrievalError> {
    if max_chars == 0 {
        return Err(RetrievalError::InvalidArgument(
            "max_chars must be > 0".to_string(),
        ));
    }

    let mut text = String::new();
    let mut used = Vec::new();
    let mut total = 0usize;

    for (rank, sc) in ranked.iter().enumerate() {
        let block = render_block(rank, &sc.chunk);
        let sep = if text.is_empty() { 0 } else { 2 };
        let block_chars = block.chars().count();
        if total + sep + block_chars > max_chars {
            break;
        }
        if sep > 0 {
            text.push_str("\n\n");
        }
        text.push_str(&block);
        total += sep + block_chars;
        used.push(sc.chunk.clone());
    }

    Ok(ContextBlock { text, used })
}

/// One context block: `[#N] FILE: <source>` header plus the chunk text.
fn render_block(rank: usize, chunk: &DocumentChunk) -> String {
    let locator = chunk
        .page_or_section
        .as_deref()
        .map(|p| format!(" (p.{})", p))
        .unwrap_or_default();
    format!(
        "[#{}] FILE: {}{}\n{}",
        rank + 1,
        chunk.source_id,
        locator,
        chunk.text
    )
}
