//! # Planroom
//!
//! A construction-document assistant: upload project files (PDF, DOCX, TXT,
//! blueprint images), ask questions grounded in those documents with
//! citations, generate structured project summaries, and analyze floor-plan
//! images into cost estimates.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────┐   ┌──────────────┐
//! │   Uploads    │──▶│    Pipeline      │──▶│  ChunkIndex  │
//! │ PDF/DOCX/TXT │   │ Extract + Chunk  │   │ (in-memory)  │
//! └──────────────┘   │     + Embed      │   └──────┬───────┘
//!                    └─────────────────┘          │
//!                          ┌──────────────────────┤
//!                          ▼                      ▼
//!                    ┌──────────┐           ┌──────────┐
//!                    │   CLI    │           │   HTTP   │
//!                    │(planroom)│           │  (axum)  │
//!                    └──────────┘           └──────────┘
//! ```
//!
//! The index lives in process memory and is rebuilt wholesale on every
//! ingestion batch; nothing is persisted across restarts.
//!
//! ## Quick Start
//!
//! ```bash
//! planroom serve                                   # start the HTTP API
//! planroom ask "What is the slab thickness?" \
//!     --file specs.pdf --file schedule.docx        # one-shot Q&A
//! planroom summarize --file scope.pdf              # structured summary JSON
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Fixed-width text chunking |
//! | [`index`] | In-memory embedding index |
//! | [`retrieve`] | Cosine top-k ranking and context assembly |
//! | [`extract`] | Best-effort text extraction from uploads |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generate`] | Answer/summary generation provider abstraction |
//! | [`blueprint`] | Floor-plan analysis post-processing |
//! | [`engine`] | Ingestion and question-answering pipelines |
//! | [`server`] | HTTP API |

pub mod blueprint;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generate;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod server;
