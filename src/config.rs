use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub max_chars: usize,
    /// Hard cap on chunks resident in the index; ingestion past this fails.
    pub max_index_chunks: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1200,
            max_index_chunks: 100_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks offered as context for a question.
    pub top_k: usize,
    /// Character budget for the assembled context block.
    pub max_context_chars: usize,
    /// Display length for citation snippets.
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            max_context_chars: 16_000,
            snippet_chars: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model identifier.
    pub model: String,
    /// Number of texts sent per API call.
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat model used for answers, summaries, and blueprint analysis.
    pub model: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
    /// Per-file character cap applied before summarization.
    pub max_summary_chars_per_file: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_retries: 3,
            timeout_secs: 120,
            max_summary_chars_per_file: 250_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Per-file upload limit in megabytes.
    pub max_file_mb: usize,
    /// Maximum files per upload request.
    pub max_files: usize,
    /// Total upload limit per request in megabytes.
    pub max_total_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            max_file_mb: 50,
            max_files: 100,
            max_total_mb: 200,
        }
    }
}

/// Load configuration from a TOML file, falling back to defaults when the
/// file does not exist (the CLI works out of the box with just
/// `OPENAI_API_KEY` in the environment).
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.max_index_chunks == 0 {
        anyhow::bail!("chunking.max_index_chunks must be > 0");
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be > 0");
    }
    if config.retrieval.max_context_chars == 0 {
        anyhow::bail!("retrieval.max_context_chars must be > 0");
    }
    if config.server.max_files == 0 {
        anyhow::bail!("server.max_files must be > 0");
    }

    Ok(config)
}
