//! In-memory embedding index.
//!
//! The index is a flat, ordered sequence of [`DocumentChunk`]s behind a
//! `std::sync::RwLock`. Each ingestion batch is accumulated off to the side
//! in an [`IndexBatch`] and installed with a single [`ChunkIndex::replace`]
//! swap, so a reader that already took a [`ChunkIndex::snapshot`] keeps the
//! fully-old sequence and a reader arriving after the swap sees the
//! fully-new one. No reader can observe a half-rebuilt index.
//!
//! Membership is append-only within a batch and the whole sequence is
//! discarded on the next batch; chunks are never individually deleted or
//! updated. Everything is process-memory resident, `O(chunks × dims)`, and
//! lost on restart.

use std::sync::{Arc, RwLock};

use crate::error::RetrievalError;
use crate::models::DocumentChunk;

/// A batch of chunks under construction, validated as it grows.
///
/// Dimensionality is pinned by the first chunk pushed; later chunks with a
/// different vector length are rejected rather than stored, since a ragged
/// index silently corrupts similarity scores at query time.
pub struct IndexBatch {
    chunks: Vec<DocumentChunk>,
    dims: Option<usize>,
    max_chunks: usize,
}

impl IndexBatch {
    /// Start an empty batch capped at `max_chunks` entries.
    pub fn new(max_chunks: usize) -> Self {
        Self {
            chunks: Vec::new(),
            dims: None,
            max_chunks,
        }
    }

    /// Append a chunk, enforcing a non-empty embedding, uniform
    /// dimensionality, and the batch cap.
    pub fn push(&mut self, chunk: DocumentChunk) -> Result<(), RetrievalError> {
        if chunk.embedding.is_empty() {
            return Err(RetrievalError::InvalidArgument(
                "chunk embedding must not be empty".to_string(),
            ));
        }
        match self.dims {
            None => self.dims = Some(chunk.embedding.len()),
            Some(d) if d != chunk.embedding.len() => {
                return Err(RetrievalError::DimensionMismatch {
                    expected: d,
                    actual: chunk.embedding.len(),
                });
            }
            Some(_) => {}
        }
        if self.chunks.len() >= self.max_chunks {
            return Err(RetrievalError::IndexFull {
                limit: self.max_chunks,
            });
        }
        self.chunks.push(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// The process-wide chunk index, owned by the engine and passed to the
/// retriever explicitly.
pub struct ChunkIndex {
    inner: RwLock<Arc<Vec<DocumentChunk>>>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Install a finished batch, discarding the previous sequence. This is
    /// the only write path: one assignment under the lock.
    pub fn replace(&self, batch: IndexBatch) {
        let next = Arc::new(batch.chunks);
        let mut guard = self.inner.write().unwrap();
        *guard = next;
    }

    /// Drop every chunk.
    pub fn clear(&self) {
        let mut guard = self.inner.write().unwrap();
        *guard = Arc::new(Vec::new());
    }

    /// A point-in-time view of the whole index. The returned `Arc` stays
    /// valid (and unchanged) across any concurrent `replace`.
    pub fn snapshot(&self) -> Arc<Vec<DocumentChunk>> {
        let guard = self.inner.read().unwrap();
        Arc::clone(&guard)
    }

    /// Vector length shared by every chunk currently indexed, if any.
    pub fn dims(&self) -> Option<usize> {
        self.snapshot().first().map(|c| c.embedding.len())
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl Default for ChunkIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, text: &str, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            source_id: source.to_string(),
            text: text.to_string(),
            embedding,
            page_or_section: None,
        }
    }

    #[test]
    fn replace_installs_batch_in_order() {
        let index = ChunkIndex::new();
        let mut batch = IndexBatch::new(10);
        batch.push(chunk("a.txt", "first", vec![1.0, 0.0])).unwrap();
        batch.push(chunk("a.txt", "second", vec![0.0, 1.0])).unwrap();
        index.replace(batch);

        let snap = index.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].text, "first");
        assert_eq!(snap[1].text, "second");
        assert_eq!(index.dims(), Some(2));
    }

    #[test]
    fn snapshot_survives_replace_unchanged() {
        let index = ChunkIndex::new();
        let mut old = IndexBatch::new(10);
        old.push(chunk("old.txt", "old", vec![1.0])).unwrap();
        index.replace(old);

        let before = index.snapshot();

        let mut new = IndexBatch::new(10);
        new.push(chunk("new.txt", "new one", vec![2.0])).unwrap();
        new.push(chunk("new.txt", "new two", vec![3.0])).unwrap();
        index.replace(new);

        // The pre-swap reader still sees exactly the old sequence.
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].text, "old");
        // A fresh reader sees exactly the new one.
        let after = index.snapshot();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].text, "new one");
    }

    #[test]
    fn empty_embedding_is_rejected() {
        let mut batch = IndexBatch::new(10);
        let err = batch.push(chunk("a.txt", "x", vec![])).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidArgument(_)));
    }

    #[test]
    fn ragged_dimensionality_is_rejected() {
        let mut batch = IndexBatch::new(10);
        batch.push(chunk("a.txt", "x", vec![1.0, 2.0])).unwrap();
        let err = batch.push(chunk("a.txt", "y", vec![1.0])).unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn batch_cap_is_enforced() {
        let mut batch = IndexBatch::new(2);
        batch.push(chunk("a.txt", "1", vec![1.0])).unwrap();
        batch.push(chunk("a.txt", "2", vec![1.0])).unwrap();
        let err = batch.push(chunk("a.txt", "3", vec![1.0])).unwrap_err();
        assert!(matches!(err, RetrievalError::IndexFull { limit: 2 }));
    }

    #[test]
    fn clear_empties_the_index() {
        let index = ChunkIndex::new();
        let mut batch = IndexBatch::new(10);
        batch.push(chunk("a.txt", "x", vec![1.0])).unwrap();
        index.replace(batch);
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.dims(), None);
    }
}
