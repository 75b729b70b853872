//! HTTP surface for ingestion and question answering.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Store uploaded files and re-ingest the data directory |
//! | `POST` | `/query` | Answer a question from the indexed documents |
//! | `GET`  | `/status` | Collection name and entry count |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Uploads are JSON, file contents base64-encoded:
//!
//! ```json
//! { "files": [ { "name": "handbook.pdf", "content_base64": "JVBERi0x..." } ] }
//! ```
//!
//! # Error Contract
//!
//! Error responses carry a machine-readable code:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "file 'a.txt' is not valid base64" } }
//! ```
//!
//! Error codes: `bad_request` (400), `payload_too_large` (413),
//! `internal` (500). A failed generation is not an error: `/query` answers
//! 200 with the error text as the answer.
//!
//! Request bodies are capped at `[server].max_upload_bytes`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front ends can
//! call the API directly.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::models::{IngestResponse, QueryResponse, UploadedFile};
use crate::pipeline::Pipeline;

/// Builds the router; exposed separately so tests can serve it on an
/// ephemeral port.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let body_limit = pipeline.config().server.max_upload_bytes;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/query", post(handle_query))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(pipeline)
}

/// Binds to `[server].bind` and serves until the process is terminated.
pub async fn run_server(pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let bind_addr = pipeline.config().server.bind.clone();
    let app = router(pipeline);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "HTTP server listening");
    println!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Malformed or oversized JSON bodies keep the JSON error shape.
fn rejected(rejection: JsonRejection) -> AppError {
    let status = rejection.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Request body exceeds server.max_upload_bytes");
        return AppError {
            status,
            code: "payload_too_large".to_string(),
            message: "request body exceeds server.max_upload_bytes".to_string(),
        };
    }
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: rejection.body_text(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);
    error!(error = %message, "Request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message,
    }
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    files: Vec<UploadPayload>,
}

#[derive(Deserialize)]
struct UploadPayload {
    name: String,
    content_base64: String,
}

async fn handle_ingest(
    State(pipeline): State<Arc<Pipeline>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    let Json(req) = payload.map_err(rejected)?;
    let engine = base64::engine::general_purpose::STANDARD;
    let mut files = Vec::with_capacity(req.files.len());
    for upload in req.files {
        let bytes = engine
            .decode(upload.content_base64.trim())
            .map_err(|e| bad_request(format!("file '{}' is not valid base64: {}", upload.name, e)))?;
        files.push(UploadedFile {
            name: upload.name,
            bytes,
        });
    }

    let response = pipeline.ingest_uploads(files).await.map_err(internal)?;
    Ok(Json(response))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

async fn handle_query(
    State(pipeline): State<Arc<Pipeline>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = payload.map_err(rejected)?;
    let response = pipeline.query(&req.question).await.map_err(internal)?;
    Ok(Json(response))
}

// ============ GET /status ============

#[derive(Serialize)]
struct StatusResponse {
    collection: String,
    entries: usize,
}

async fn handle_status(
    State(pipeline): State<Arc<Pipeline>>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = pipeline.status().await.map_err(internal)?;
    Ok(Json(StatusResponse {
        collection: status.collection,
        entries: status.entries,
    }))
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
