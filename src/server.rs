//! HTTP server for receipt scanning.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/api/receipts/scan` | Store + recognize an upload, return extracted fields |
//! | `POST` | `/api/expenses/categorize` | Categorize a free-text description |
//! | `POST` | `/api/documents/parse` | Recognize an upload, return every amount and date |
//!
//! Upload endpoints accept `multipart/form-data` (the first part with a
//! `filename` is used) or a raw body, treated as one anonymous attachment.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "request body is empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `payload_too_large` (413), `internal` (500).
//! Collaborator failures during a scan never produce an error status; they
//! only empty the affected response fields.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the dashboard can call
//! the API from the browser.

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        DefaultBodyLimit, State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::ingest::Ingestor;
use wedexpense_core::models::{ParsedDocument, ScanResponse};

#[derive(Clone)]
struct AppState {
    ingestor: Arc<Ingestor>,
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ingestor = Arc::new(Ingestor::from_config(config)?);
    let app = router(ingestor, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "wedx server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router. Exposed so tests can drive it without a
/// socket.
pub fn router(ingestor: Arc<Ingestor>, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/receipts/scan", post(handle_scan))
        .route("/api/expenses/categorize", post(handle_categorize))
        .route("/api/documents/parse", post(handle_parse))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { ingestor })
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

fn payload_too_large(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::PAYLOAD_TOO_LARGE,
        code: "payload_too_large".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map an axum body rejection onto the JSON error contract.
fn rejection(status: StatusCode, text: String) -> AppError {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => payload_too_large(text),
        s if s.is_client_error() => AppError {
            status: s,
            code: "bad_request".to_string(),
            message: text,
        },
        _ => internal(text),
    }
}

fn upload_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, AppError> {
    let body = body.map_err(|e| rejection(e.status(), e.body_text()))?;
    if body.is_empty() {
        return Err(bad_request("request body is empty"));
    }
    Ok(body)
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
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

// ============ POST /api/receipts/scan ============

async fn handle_scan(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ScanResponse>, AppError> {
    let body = upload_body(body)?;
    let response = state
        .ingestor
        .scan_upload(content_type(&headers), &body)
        .await;
    Ok(Json(response))
}

// ============ POST /api/expenses/categorize ============

#[derive(Deserialize)]
struct CategorizeRequest {
    #[serde(default)]
    description: String,
}

#[derive(Serialize)]
struct CategorizeResponse {
    category: String,
}

async fn handle_categorize(
    State(state): State<AppState>,
    request: Result<Json<CategorizeRequest>, JsonRejection>,
) -> Result<Json<CategorizeResponse>, AppError> {
    let Json(request) = request.map_err(|e| rejection(e.status(), e.body_text()))?;
    let assignment = state
        .ingestor
        .categorize_description(&request.description)
        .await;
    Ok(Json(CategorizeResponse {
        category: assignment.category,
    }))
}

// ============ POST /api/documents/parse ============

async fn handle_parse(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ParsedDocument>, AppError> {
    let body = upload_body(body)?;
    let parsed = state
        .ingestor
        .parse_document(content_type(&headers), &body)
        .await;
    Ok(Json(parsed))
}
