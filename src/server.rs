//! HTTP API for the document assistant dashboard.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Upload files; rebuild the index from this batch |
//! | `POST` | `/ask` | Answer a question with citations |
//! | `POST` | `/summarize` | Structured summary JSON for uploaded files |
//! | `POST` | `/blueprint` | Analyze a floor-plan image |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses carry one shape:
//!
//! ```json
//! { "error": { "code": "missing_question", "message": "question must not be empty" } }
//! ```
//!
//! Codes: `bad_request`, `missing_question` (400), `file_too_large`,
//! `too_many_files`, `upload_too_large` (413), `upstream_unavailable` (503),
//! `upstream_error` (502), `internal` (500). A question with no grounding is
//! not an error: `/ask` answers `200` with the fixed refusal text and no
//! citations.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the dashboard can be
//! served from a separate dev origin.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::error::{ProviderError, RetrievalError};
use crate::extract::is_supported_image;
use crate::models::UploadedFile;

/// Shared state for all route handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    limits: ServerConfig,
}

/// Start the HTTP server and run until the process is terminated.
pub async fn run_server(server_config: &ServerConfig, engine: Arc<Engine>) -> anyhow::Result<()> {
    let bind_addr = server_config.bind.clone();
    let state = AppState {
        engine,
        limits: server_config.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Body limit sits just above the documented total so the handler, not
    // the framework, produces the 413 with a meaningful code.
    let body_limit = (state.limits.max_total_mb + 8) * 1024 * 1024;

    let app = Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/ask", post(handle_ask))
        .route("/summarize", post(handle_summarize))
        .route("/blueprint", post(handle_blueprint))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state);

    println!("planroom API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error body shared by every failing route.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: code.to_string(),
        message: message.into(),
    }
}

fn payload_too_large(code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::PAYLOAD_TOO_LARGE,
        code: code.to_string(),
        message: message.into(),
    }
}

/// Map an engine failure to the closest HTTP status: contract violations
/// are the client's fault, provider outages are retryable upstream
/// conditions, everything else is internal.
fn classify_engine_error(err: anyhow::Error) -> AppError {
    if let Some(retrieval) = err.downcast_ref::<RetrievalError>() {
        return bad_request("bad_request", retrieval.to_string());
    }
    if let Some(provider) = err.downcast_ref::<ProviderError>() {
        return match provider {
            ProviderError::Unavailable(_) => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "upstream_unavailable".to_string(),
                message: provider.to_string(),
            },
            _ => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream_error".to_string(),
                message: provider.to_string(),
            },
        };
    }
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ Upload handling ============

/// Drain a multipart request into memory, enforcing the configured file
/// count and size limits.
async fn collect_files(
    mut multipart: Multipart,
    limits: &ServerConfig,
) -> Result<Vec<UploadedFile>, AppError> {
    let max_file_bytes = limits.max_file_mb * 1024 * 1024;
    let max_total_bytes = limits.max_total_mb * 1024 * 1024;

    let mut files = Vec::new();
    let mut total_bytes = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request("bad_request", format!("malformed multipart body: {}", e)))?
    {
        let name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request("bad_request", format!("failed to read upload: {}", e)))?;

        if bytes.len() > max_file_bytes {
            return Err(payload_too_large(
                "file_too_large",
                format!("{} exceeds the {} MB per-file limit", name, limits.max_file_mb),
            ));
        }
        if files.len() >= limits.max_files {
            return Err(payload_too_large(
                "too_many_files",
                format!("at most {} files per request", limits.max_files),
            ));
        }
        total_bytes += bytes.len();
        if total_bytes > max_total_bytes {
            return Err(payload_too_large(
                "upload_too_large",
                format!("total upload exceeds the {} MB limit", limits.max_total_mb),
            ));
        }

        files.push(UploadedFile {
            name,
            bytes: bytes.to_vec(),
        });
    }

    Ok(files)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingest ============

#[derive(Serialize)]
struct IngestResponse {
    ok: bool,
    files: usize,
    files_skipped: usize,
    chunks: usize,
}

/// Upload a batch of documents. The index is rebuilt from exactly this
/// batch; previous uploads are discarded.
async fn handle_ingest(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    let files = collect_files(multipart, &state.limits).await?;
    if files.is_empty() {
        return Err(bad_request("bad_request", "no files uploaded"));
    }

    let report = state
        .engine
        .ingest(files)
        .await
        .map_err(classify_engine_error)?;

    Ok(Json(IngestResponse {
        ok: true,
        files: report.files,
        files_skipped: report.files_skipped,
        chunks: report.chunks,
    }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<crate::models::Answer>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("missing_question", "question must not be empty"));
    }

    let answer = state
        .engine
        .ask(&req.question)
        .await
        .map_err(classify_engine_error)?;

    Ok(Json(answer))
}

// ============ POST /summarize ============

async fn handle_summarize(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let files = collect_files(multipart, &state.limits).await?;
    if files.is_empty() {
        return Err(bad_request("bad_request", "no files uploaded"));
    }

    let summary = state
        .engine
        .summarize(files)
        .await
        .map_err(classify_engine_error)?;

    Ok(Json(summary))
}

// ============ POST /blueprint ============

/// Analyze a single uploaded floor-plan image (PNG or JPEG).
async fn handle_blueprint(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let files = collect_files(multipart, &state.limits).await?;
    let file = files
        .into_iter()
        .next()
        .ok_or_else(|| bad_request("bad_request", "no file uploaded (use field name \"file\")"))?;

    if !is_supported_image(&file.name) {
        return Err(bad_request(
            "bad_request",
            "please upload a PNG or JPG image",
        ));
    }
    let mime = if file.name.to_lowercase().ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    };

    let analysis = state
        .engine
        .analyze_blueprint(mime, &file.bytes)
        .await
        .map_err(classify_engine_error)?;

    Ok(Json(analysis))
}
