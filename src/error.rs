//! Typed errors for the retrieval core and external providers.
//!
//! The retrieval core never masks a contract violation: bad arguments fail
//! immediately with [`RetrievalError`]. An empty index or an empty context
//! are not errors anywhere in the crate; they are defined outcomes that the
//! caller renders as the fixed refusal answer.
//!
//! Provider failures carry a [`ProviderError`] so the HTTP layer can
//! distinguish a retryable outage from a hard API rejection, even though the
//! user-facing rendering stays uniform.

use thiserror::Error;

/// Errors raised by the chunker, index, and retriever.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// A caller contract violation: non-positive sizes, an empty query
    /// vector, or an empty embedding on an indexed chunk.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Embedding vectors of different lengths were about to be compared or
    /// stored together. A ragged index silently corrupts similarity scores,
    /// so the offending vector is rejected instead.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The ingestion batch grew past the configured chunk cap.
    #[error("chunk index is full: limit is {limit} chunks")]
    IndexFull { limit: usize },
}

/// Errors raised by the embedding and generation providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider timed out or stayed unreachable through all retries.
    /// Retryable by the caller; no retries happen above the provider itself.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the request (a non-retryable API error).
    #[error("provider error {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider answered with a payload the client could not use.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
