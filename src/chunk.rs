//! Fixed-width text chunker.
//!
//! Splits extracted document text into contiguous, non-overlapping pieces of
//! at most `max_chars` characters, in order. Concatenating the pieces
//! reproduces the input exactly, which is what keeps every citation
//! traceable back to a real span of the source document.
//!
//! Splitting is character-counted, not byte-counted, so multi-byte UTF-8
//! never lands on an invalid boundary. There is no sentence or paragraph
//! awareness; callers only rely on "covers the whole text, in order,
//! bounded length", so a smarter splitter could slot in later without
//! changing the contract.

use crate::error::RetrievalError;

/// Split `text` into chunks of `max_chars` characters each; the final chunk
/// holds the remainder.
///
/// Empty input yields an empty vector, not a single empty chunk. A zero
/// `max_chars` is a caller bug and fails fast.
pub fn chunk_text(text: &str, max_chars: usize) -> Result<Vec<String>, RetrievalError> {
    if max_chars == 0 {
        return Err(RetrievalError::InvalidArgument(
            "max_chars must be > 0".to_string(),
        ));
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut chunks = Vec::with_capacity(text.len() / max_chars + 1);
    let mut buf = String::new();
    let mut count = 0usize;

    for ch in text.chars() {
        buf.push(ch);
        count += 1;
        if count == max_chars {
            chunks.push(std::mem::take(&mut buf));
            count = 0;
        }
    }
    if !buf.is_empty() {
        chunks.push(buf);
    }

    Ok(chunks)
}
