//! Ingestion, question-answering, summarization, and blueprint pipelines.
//!
//! [`Engine`] owns the chunk index and the injected providers; the HTTP
//! server and the CLI both drive it. Control flow mirrors the product
//! surface:
//!
//! - ingest: extract each upload, chunk, embed in batches, then install the
//!   finished batch with one atomic swap. The previous index stays fully
//!   intact until the swap, so a provider failure mid-batch leaves queries
//!   untouched.
//! - ask: embed the question, rank the index, assemble the budgeted
//!   context, and generate. No grounding means the fixed refusal answer,
//!   never a fabricated one.
//! - summarize and analyze_blueprint: thin orchestration over the
//!   generation provider plus deterministic post-processing.

use anyhow::Result;
use std::sync::Arc;

use crate::blueprint;
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::RetrievalError;
use crate::extract::extract_text;
use crate::generate::{Generator, NOT_FOUND_ANSWER};
use crate::index::{ChunkIndex, IndexBatch};
use crate::models::{Answer, Citation, DocumentChunk, IngestReport, UploadedFile};
use crate::retrieve::{build_context, top_k};

/// The assistant's application core: index plus providers.
pub struct Engine {
    config: Config,
    index: ChunkIndex,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl Engine {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Self {
        Self {
            config,
            index: ChunkIndex::new(),
            embedder,
            generator,
        }
    }

    /// Number of chunks currently indexed.
    pub fn indexed_chunks(&self) -> usize {
        self.index.len()
    }

    /// Extract, chunk, and count an upload batch without touching providers
    /// or the index. Returns `(files_with_text, total_chunks)`.
    pub fn dry_run(&self, files: &[UploadedFile]) -> Result<(usize, usize)> {
        let mut with_text = 0usize;
        let mut total_chunks = 0usize;
        for file in files {
            let text = extract_text(&file.bytes, &file.name);
            if text.is_empty() {
                continue;
            }
            with_text += 1;
            total_chunks += chunk_text(&text, self.config.chunking.max_chars)?.len();
        }
        Ok((with_text, total_chunks))
    }

    /// Ingest an upload batch, replacing the whole index on success.
    ///
    /// Files whose extraction yields no text are skipped. Embeddings are
    /// requested in provider-sized batches; any provider failure aborts the
    /// whole ingestion and leaves the previous index in place.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestReport> {
        let file_count = files.len();
        let mut skipped = 0usize;
        let mut pending: Vec<(String, String)> = Vec::new();

        for file in &files {
            let text = extract_text(&file.bytes, &file.name);
            if text.is_empty() {
                skipped += 1;
                continue;
            }
            for piece in chunk_text(&text, self.config.chunking.max_chars)? {
                pending.push((file.name.clone(), piece));
            }
        }

        let mut batch = IndexBatch::new(self.config.chunking.max_index_chunks);

        for group in pending.chunks(self.config.embedding.batch_size.max(1)) {
            let texts: Vec<String> = group.iter().map(|(_, t)| t.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != group.len() {
                anyhow::bail!(
                    "embedding count mismatch: sent {}, got {}",
                    group.len(),
                    vectors.len()
                );
            }
            for ((source_id, text), embedding) in group.iter().zip(vectors) {
                batch.push(DocumentChunk {
                    source_id: source_id.clone(),
                    text: text.clone(),
                    embedding,
                    page_or_section: None,
                })?;
            }
        }

        let chunks = batch.len();
        self.index.replace(batch);

        Ok(IngestReport {
            files: file_count,
            files_skipped: skipped,
            chunks,
        })
    }

    /// Answer a question against the current index.
    ///
    /// An empty index, an empty context, and a blank generation all resolve
    /// to the fixed refusal answer; only a blank question is an error.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RetrievalError::InvalidArgument(
                "question must not be empty".to_string(),
            )
            .into());
        }

        if self.index.is_empty() {
            return Ok(Answer {
                answer: NOT_FOUND_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }

        let query_vec = self.embedder.embed_query(question).await?;
        let ranked = top_k(&self.index, &query_vec, self.config.retrieval.top_k)?;
        let context = build_context(&ranked, self.config.retrieval.max_context_chars)?;

        if context.text.trim().is_empty() {
            return Ok(Answer {
                answer: NOT_FOUND_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }

        let reply = self.generator.answer(question, &context.text).await?;
        let answer = if reply.trim().is_empty() {
            NOT_FOUND_ANSWER.to_string()
        } else {
            reply
        };

        let citations = ranked
            .iter()
            .map(|sc| Citation {
                source: sc.chunk.source_id.clone(),
                snippet: truncate_chars(&sc.chunk.text, self.config.retrieval.snippet_chars),
            })
            .collect();

        Ok(Answer { answer, citations })
    }

    /// Summarize an upload batch into schema-keyed JSON. Does not touch the
    /// index; summaries read the uploads directly.
    pub async fn summarize(&self, files: Vec<UploadedFile>) -> Result<serde_json::Value> {
        if files.is_empty() {
            return Err(RetrievalError::InvalidArgument(
                "no files uploaded".to_string(),
            )
            .into());
        }

        let cap = self.config.generation.max_summary_chars_per_file;
        let mut sections = Vec::with_capacity(files.len());
        for file in &files {
            let text = extract_text(&file.bytes, &file.name);
            sections.push(format!(
                "### FILE: {}\n{}",
                file.name,
                truncate_chars(&text, cap)
            ));
        }
        let corpus = sections.join("\n\n");

        let summary = self.generator.summarize(&corpus).await?;
        Ok(crate::generate::normalize_summary(summary))
    }

    /// Analyze a blueprint image into structured JSON with a synthesized
    /// overview paragraph.
    ///
    /// When the model's output cannot be parsed as JSON even after salvage,
    /// the raw text is reported back under a structured wrapper instead of
    /// failing the call.
    pub async fn analyze_blueprint(&self, mime: &str, image: &[u8]) -> Result<serde_json::Value> {
        let raw = self.generator.analyze_blueprint(mime, image).await?;
        match blueprint::salvage_json(&raw) {
            Some(mut analysis) => {
                blueprint::synthesize_overview(&mut analysis);
                Ok(analysis)
            }
            None => Ok(serde_json::json!({
                "error": "MODEL_RETURNED_NON_JSON",
                "raw": raw,
            })),
        }
    }
}

/// Truncate to at most `max_chars` characters on a character boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
