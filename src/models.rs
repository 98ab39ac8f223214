//! Core data types that flow through the ingestion and retrieval pipeline.

use serde::Serialize;

/// The unit of retrieval: one bounded slice of a source document's text,
/// paired with the embedding computed for it at ingestion time.
///
/// Chunks for a document are contiguous and non-overlapping; concatenating
/// them in order reproduces the extracted text exactly. The embedding is
/// computed once and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    /// Originating filename. Duplicate names across a batch are possible,
    /// so this is a display label, not a key.
    pub source_id: String,
    /// The chunk's slice of the extracted plain text.
    pub text: String,
    /// Embedding vector; dimensionality is uniform across the index.
    pub embedding: Vec<f32>,
    /// Page or section locator for citation display, when extraction
    /// provides one.
    pub page_or_section: Option<String>,
}

/// A chunk paired with its similarity score for one query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// A citation shown next to an answer: the source label and a short
/// excerpt of the chunk that grounded it.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub source: String,
    pub snippet: String,
}

/// The answer to one question, with the citations derived from the ranked
/// chunks that were offered as context.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// Counters reported after an ingestion batch.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Files received in the batch.
    pub files: usize,
    /// Files that yielded no text and were skipped.
    pub files_skipped: usize,
    /// Chunks now resident in the index.
    pub chunks: usize,
}

/// An uploaded file before extraction: the client-supplied name plus raw
/// bytes. The name's extension drives format dispatch.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}
