//! # Planroom CLI
//!
//! The `planroom` binary drives the construction-document assistant from
//! the command line and hosts its HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! planroom --config ./planroom.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `planroom serve` | Start the HTTP API for the dashboard |
//! | `planroom ask "<question>" --file <path>...` | One-shot: ingest the files and answer |
//! | `planroom summarize --file <path>...` | Print a structured summary JSON |
//!
//! All commands read `OPENAI_API_KEY` from the environment. The config file
//! is optional; defaults cover every setting.
//!
//! ## Examples
//!
//! ```bash
//! # Serve the dashboard API
//! planroom serve
//!
//! # Ask against a spec and a schedule
//! planroom ask "What is the slab thickness?" --file specs.pdf --file schedule.docx
//!
//! # Count chunks without calling any provider
//! planroom ask "anything" --file specs.pdf --dry-run
//!
//! # Structured project summary
//! planroom summarize --file scope.pdf --file quotes.docx
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use planroom::config::{self, Config};
use planroom::embedding::OpenAiEmbedder;
use planroom::engine::Engine;
use planroom::generate::OpenAiGenerator;
use planroom::models::UploadedFile;
use planroom::server;

/// Planroom: grounded Q&A, summaries, and blueprint analysis over
/// construction project documents.
#[derive(Parser)]
#[command(
    name = "planroom",
    about = "Construction-document assistant: grounded Q&A with citations, project summaries, and blueprint analysis",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Optional; defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./planroom.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    ///
    /// Exposes /ingest, /ask, /summarize, /blueprint, and /health for the
    /// browser dashboard.
    Serve,

    /// Ingest files and answer one question.
    ///
    /// The index is built in-process for this invocation only; nothing is
    /// persisted.
    Ask {
        /// The question to answer.
        question: String,

        /// Document to ingest (repeatable).
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Show file and chunk counts without calling any provider.
        #[arg(long)]
        dry_run: bool,
    },

    /// Summarize files into structured project JSON.
    Summarize {
        /// Document to summarize (repeatable).
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
    },
}

/// Read CLI-supplied paths into upload records named by their filename.
fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadedFile { name, bytes });
    }
    Ok(files)
}

fn build_engine(cfg: &Config) -> Result<Engine> {
    let embedder = Arc::new(OpenAiEmbedder::new(&cfg.embedding)?);
    let generator = Arc::new(OpenAiGenerator::new(&cfg.generation)?);
    Ok(Engine::new(cfg.clone(), embedder, generator))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let engine = Arc::new(build_engine(&cfg)?);
            server::run_server(&cfg.server, engine).await?;
        }
        Commands::Ask {
            question,
            files,
            dry_run,
        } => {
            let uploads = read_files(&files)?;

            if dry_run {
                // No providers needed for counting.
                let engine = Engine::new(
                    cfg.clone(),
                    Arc::new(NoEmbedder),
                    Arc::new(NoGenerator),
                );
                let (with_text, chunks) = engine.dry_run(&uploads)?;
                println!("ask (dry-run)");
                println!("  files: {}", uploads.len());
                println!("  files with text: {}", with_text);
                println!("  estimated chunks: {}", chunks);
                return Ok(());
            }

            let engine = build_engine(&cfg)?;
            let report = engine.ingest(uploads).await?;
            println!("ingested {} files ({} chunks)", report.files, report.chunks);
            if report.files_skipped > 0 {
                println!("  skipped (no text): {}", report.files_skipped);
            }

            let answer = engine.ask(&question).await?;
            println!();
            println!("{}", answer.answer);
            if !answer.citations.is_empty() {
                println!();
                println!("Citations:");
                for (i, c) in answer.citations.iter().enumerate() {
                    println!("  [#{}] {}: {}", i + 1, c.source, c.snippet);
                }
            }
        }
        Commands::Summarize { files } => {
            let uploads = read_files(&files)?;
            let engine = build_engine(&cfg)?;
            let summary = engine.summarize(uploads).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Stand-in providers for `--dry-run`, which never reaches them.
struct NoEmbedder;

#[async_trait::async_trait]
impl planroom::embedding::Embedder for NoEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn embed(
        &self,
        _texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, planroom::error::ProviderError> {
        Err(planroom::error::ProviderError::Unavailable(
            "embedding provider disabled for dry-run".to_string(),
        ))
    }
}

struct NoGenerator;

#[async_trait::async_trait]
impl planroom::generate::Generator for NoGenerator {
    async fn answer(
        &self,
        _question: &str,
        _context: &str,
    ) -> std::result::Result<String, planroom::error::ProviderError> {
        Err(planroom::error::ProviderError::Unavailable(
            "generation provider disabled for dry-run".to_string(),
        ))
    }
    async fn summarize(
        &self,
        _corpus: &str,
    ) -> std::result::Result<serde_json::Value, planroom::error::ProviderError> {
        Err(planroom::error::ProviderError::Unavailable(
            "generation provider disabled for dry-run".to_string(),
        ))
    }
    async fn analyze_blueprint(
        &self,
        _mime: &str,
        _image: &[u8],
    ) -> std::result::Result<String, planroom::error::ProviderError> {
        Err(planroom::error::ProviderError::Unavailable(
            "generation provider disabled for dry-run".to_string(),
        ))
    }
}
