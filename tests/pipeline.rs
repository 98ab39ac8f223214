//! End-to-end pipeline tests over in-process fake providers.
//!
//! The fakes stand in for the embedding and generation APIs: the embedder
//! scores texts on fixed keyword axes so ranking is predictable, and the
//! generator replies deterministically. No network is involved.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use planroom::config::Config;
use planroom::embedding::Embedder;
use planroom::engine::Engine;
use planroom::error::ProviderError;
use planroom::generate::{Generator, NOT_FOUND_ANSWER};
use planroom::models::UploadedFile;

/// Embeds a text onto two keyword axes (structural vs. finishes) plus a
/// small constant component so no vector is all-zero.
struct KeywordEmbedder;

fn keyword_vec(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let structural = ["slab", "concrete", "footing", "rebar"]
        .iter()
        .filter(|w| lower.contains(*w))
        .count() as f32;
    let finishes = ["paint", "eggshell", "trim", "flooring"]
        .iter()
        .filter(|w| lower.contains(*w))
        .count() as f32;
    vec![structural, finishes, 0.1]
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|t| keyword_vec(t)).collect())
    }
}

/// Always fails; used to prove a failed batch leaves the old index alone.
struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-test"
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Unavailable("embeddings down".to_string()))
    }
}

/// Deterministic generator that records how often it was called.
struct ScriptedGenerator {
    answer: String,
    summary: serde_json::Value,
    blueprint: String,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            summary: serde_json::json!({ "executive_summary": "Small remodel." }),
            blueprint: String::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_blueprint(raw: &str) -> Self {
        let mut g = Self::new("unused");
        g.blueprint = raw.to_string();
        g
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn answer(&self, _question: &str, _context: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
    async fn summarize(&self, _corpus: &str) -> Result<serde_json::Value, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.summary.clone())
    }
    async fn analyze_blueprint(&self, _mime: &str, _image: &[u8]) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.blueprint.clone())
    }
}

fn txt(name: &str, body: &str) -> UploadedFile {
    UploadedFile {
        name: name.to_string(),
        bytes: body.as_bytes().to_vec(),
    }
}

fn engine_with(generator: Arc<ScriptedGenerator>) -> Engine {
    Engine::new(Config::default(), Arc::new(KeywordEmbedder), generator)
}

#[tokio::test]
async fn ingest_then_ask_ranks_the_relevant_file_first() {
    let generator = Arc::new(ScriptedGenerator::new("The slab is 4 inches thick. [#1]"));
    let engine = engine_with(Arc::clone(&generator));

    let report = engine
        .ingest(vec![
            txt("paint.txt", "Paint color is eggshell white on all trim."),
            txt("structure.txt", "Slab thickness is 4 inches with rebar at 12 inches."),
        ])
        .await
        .unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.files_skipped, 0);
    assert_eq!(report.chunks, 2);
    assert_eq!(engine.indexed_chunks(), 2);

    let answer = engine.ask("What is the slab thickness?").await.unwrap();
    assert_eq!(answer.answer, "The slab is 4 inches thick. [#1]");
    assert_eq!(answer.citations.len(), 2);
    assert_eq!(answer.citations[0].source, "structure.txt");
    assert_eq!(answer.citations[1].source, "paint.txt");
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn empty_index_answers_with_the_exact_refusal_string() {
    let generator = Arc::new(ScriptedGenerator::new("should never be called"));
    let engine = engine_with(Arc::clone(&generator));

    let answer = engine.ask("What is the slab thickness?").await.unwrap();
    assert_eq!(answer.answer, "Not found in the uploaded documents.");
    assert_eq!(answer.answer, NOT_FOUND_ANSWER);
    assert!(answer.citations.is_empty());
    // The generator was never consulted.
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let engine = engine_with(Arc::new(ScriptedGenerator::new("x")));
    assert!(engine.ask("   ").await.is_err());
}

#[tokio::test]
async fn reingest_replaces_the_previous_batch_wholesale() {
    let engine = engine_with(Arc::new(ScriptedGenerator::new("ok")));

    engine
        .ingest(vec![txt("old.txt", "Footing schedule and rebar notes.")])
        .await
        .unwrap();
    assert_eq!(engine.indexed_chunks(), 1);

    engine
        .ingest(vec![
            txt("new-a.txt", "Concrete slab pour plan."),
            txt("new-b.txt", "Paint and flooring finishes."),
        ])
        .await
        .unwrap();
    assert_eq!(engine.indexed_chunks(), 2);

    let answer = engine.ask("rebar footing?").await.unwrap();
    for citation in &answer.citations {
        assert_ne!(citation.source, "old.txt");
    }
}

#[tokio::test]
async fn failed_embedding_batch_leaves_the_old_index_intact() {
    let generator = Arc::new(ScriptedGenerator::new("grounded answer"));
    let good = engine_with(Arc::clone(&generator));
    good.ingest(vec![txt("keep.txt", "Slab pour schedule.")])
        .await
        .unwrap();

    // Same index, new engine wiring is not possible from outside, so this
    // exercises the property at the engine level: a failing provider means
    // the ingest errors and the index the engine already holds is unchanged.
    let failing = Engine::new(
        Config::default(),
        Arc::new(FailingEmbedder),
        Arc::new(ScriptedGenerator::new("unused")),
    );
    failing
        .ingest(vec![txt("seed.txt", "Seed slab data.")])
        .await
        .unwrap_err();
    assert_eq!(failing.indexed_chunks(), 0);

    // The healthy engine still answers from its existing batch.
    let answer = good.ask("When is the slab pour?").await.unwrap();
    assert_eq!(answer.answer, "grounded answer");
    assert_eq!(answer.citations[0].source, "keep.txt");
}

#[tokio::test]
async fn files_without_text_are_skipped_not_fatal() {
    let engine = engine_with(Arc::new(ScriptedGenerator::new("ok")));
    let report = engine
        .ingest(vec![
            txt("notes.txt", "Slab notes."),
            UploadedFile {
                name: "photo.heic".to_string(),
                bytes: vec![0xFF, 0xD8, 0x00],
            },
        ])
        .await
        .unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.chunks, 1);
}

#[tokio::test]
async fn citation_snippets_are_truncated_to_the_display_length() {
    let engine = engine_with(Arc::new(ScriptedGenerator::new("ok")));
    let long_body = format!("Slab specification. {}", "x".repeat(600));
    engine.ingest(vec![txt("long.txt", &long_body)]).await.unwrap();

    let answer = engine.ask("slab?").await.unwrap();
    let snippet = &answer.citations[0].snippet;
    assert_eq!(snippet.chars().count(), 200);
    assert!(long_body.starts_with(snippet));
}

#[tokio::test]
async fn unfittable_context_degrades_to_the_refusal_answer() {
    let mut config = Config::default();
    // Budget too small for even the single best chunk with its header.
    config.retrieval.max_context_chars = 10;
    let generator = Arc::new(ScriptedGenerator::new("should never be called"));
    let engine = Engine::new(
        config,
        Arc::new(KeywordEmbedder),
        Arc::clone(&generator) as Arc<dyn Generator>,
    );

    engine
        .ingest(vec![txt("spec.txt", "Slab thickness is 4 inches.")])
        .await
        .unwrap();
    let answer = engine.ask("What is the slab thickness?").await.unwrap();
    assert_eq!(answer.answer, NOT_FOUND_ANSWER);
    assert!(answer.citations.is_empty());
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn blank_generation_degrades_to_the_refusal_answer() {
    let engine = engine_with(Arc::new(ScriptedGenerator::new("   ")));
    engine
        .ingest(vec![txt("spec.txt", "Slab thickness is 4 inches.")])
        .await
        .unwrap();
    let answer = engine.ask("What is the slab thickness?").await.unwrap();
    assert_eq!(answer.answer, NOT_FOUND_ANSWER);
}

#[tokio::test]
async fn dry_run_counts_without_providers() {
    let engine = Engine::new(
        Config::default(),
        Arc::new(FailingEmbedder),
        Arc::new(ScriptedGenerator::new("unused")),
    );
    let body = "c".repeat(2500);
    let (with_text, chunks) = engine
        .dry_run(&[txt("big.txt", &body), txt("skip.bin", "ignored")])
        .unwrap();
    assert_eq!(with_text, 1);
    // 2500 chars at the default 1200-char width.
    assert_eq!(chunks, 3);
}

#[tokio::test]
async fn summarize_backfills_all_schema_keys() {
    let generator = Arc::new(ScriptedGenerator::new("unused"));
    let engine = engine_with(Arc::clone(&generator));

    let summary = engine
        .summarize(vec![txt("scope.txt", "Demolish and rebuild the garage.")])
        .await
        .unwrap();
    assert_eq!(summary["executive_summary"], "Small remodel.");
    assert_eq!(summary["sources"], serde_json::json!([]));
    assert_eq!(summary["key_objectives"], serde_json::json!([]));
    assert!(summary["estimated_timeline"].is_null());
    assert!(summary.get("risks_and_mitigations").is_some());
}

#[tokio::test]
async fn summarize_without_files_is_rejected() {
    let engine = engine_with(Arc::new(ScriptedGenerator::new("unused")));
    assert!(engine.summarize(Vec::new()).await.is_err());
}

#[tokio::test]
async fn blueprint_analysis_salvages_json_and_adds_an_overview() {
    let raw = r#"Here you go:
{"rooms":[{"name":"kitchen","sqft":180}],"trades":{"flooring":{"sqft":180}},"materials":[],"grand_total_usd":9000}
Hope that helps!"#;
    let generator = Arc::new(ScriptedGenerator::with_blueprint(raw));
    let engine = engine_with(generator);

    let analysis = engine
        .analyze_blueprint("image/png", &[0x89, 0x50, 0x4E, 0x47])
        .await
        .unwrap();
    assert_eq!(analysis["grand_total_usd"], 9000);
    let summary = analysis["summary"].as_str().unwrap();
    assert!(summary.contains("1 room"));
    assert!(summary.contains("$9,000"));
}

#[tokio::test]
async fn blueprint_non_json_output_is_reported_not_fatal() {
    let generator = Arc::new(ScriptedGenerator::with_blueprint(
        "I cannot read this drawing.",
    ));
    let engine = engine_with(generator);

    let analysis = engine
        .analyze_blueprint("image/jpeg", &[0xFF, 0xD8])
        .await
        .unwrap();
    assert_eq!(analysis["error"], "MODEL_RETURNED_NON_JSON");
    assert_eq!(analysis["raw"], "I cannot read this drawing.");
}
