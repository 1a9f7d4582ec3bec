//! HTTP surface for the research assistant.
//!
//! Every route sits under the configured prefix (default `/api`):
//!
//! - `POST /upload` – Multipart upload (`file` field) of a PDF. Returns `{doc_id, message}`.
//! - `POST /ask` – Answer a question about an uploaded document with page citations.
//! - `GET /summary/:doc_id` – Concise summary of the document's leading pages.
//! - `DELETE /documents/:doc_id` – Drop a document. Deleting an unknown id succeeds.
//! - `GET /documents` – Metadata for resident documents.
//! - `GET /metrics` – Processing counters.
//! - `GET /health` – Liveness probe, also mounted at the root.
//!
//! Failures are returned as `{"detail": "..."}`. Internal errors are logged and replaced with a
//! per-endpoint message.

use crate::config::Config;
use crate::metrics::MetricsSnapshot;
use crate::processing::{
    Citation, ConversationTurn, DocumentMetadata, ProcessingError, RagApi, pdf::ensure_pdf_filename,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Router wiring resolved from configuration.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Path prefix for every route; empty mounts at the root.
    pub api_prefix: String,
    /// Upload body limit in bytes.
    pub max_upload_bytes: usize,
    /// Allowed CORS origins; `None` allows any.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            cors_origins: None,
        }
    }
}

impl RouterOptions {
    /// Resolve options from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_prefix: config.api_prefix.clone(),
            max_upload_bytes: config.max_upload_bytes,
            cors_origins: config.cors_origins.clone(),
        }
    }
}

/// Build the HTTP router over `service`.
pub fn create_router<S>(service: Arc<S>, options: RouterOptions) -> Router
where
    S: RagApi + 'static,
{
    let api = Router::new()
        .route(
            "/upload",
            post(upload_document::<S>).layer(DefaultBodyLimit::max(options.max_upload_bytes)),
        )
        .route("/ask", post(ask_question::<S>))
        .route("/summary/:doc_id", get(summarize_document::<S>))
        .route("/documents", get(list_documents::<S>))
        .route("/documents/:doc_id", delete(delete_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/health", get(health))
        .with_state(service);

    let router = if options.api_prefix.is_empty() {
        api
    } else {
        Router::new()
            .route("/health", get(health))
            .nest(&options.api_prefix, api)
    };

    router
        .layer(cors_layer(options.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let allow_origin = match origins {
        Some(origins) => AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ),
        None => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Success response for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    doc_id: String,
    message: &'static str,
}

/// Accept a multipart PDF upload.
///
/// The filename is checked before the field body is read, so non-PDF uploads never reach the
/// pipeline.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: RagApi,
{
    const FAILURE: &str = "Failed to process document.";

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::new(unreadable(error), FAILURE))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        ensure_pdf_filename(&filename).map_err(|error| AppError::new(error, FAILURE))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|error| AppError::new(unreadable(error), FAILURE))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| {
        AppError::new(
            ProcessingError::InvalidUpload("Missing 'file' field.".to_string()),
            FAILURE,
        )
    })?;

    let outcome = service
        .ingest_pdf(&filename, bytes)
        .await
        .map_err(|error| AppError::new(error, FAILURE))?;
    tracing::info!(
        doc_id = %outcome.doc_id,
        filename = %filename,
        pages = outcome.page_count,
        chunks = outcome.chunk_count,
        "Upload completed"
    );
    Ok(Json(UploadResponse {
        doc_id: outcome.doc_id,
        message: "Document uploaded and processed successfully.",
    }))
}

fn unreadable(error: impl std::fmt::Display) -> ProcessingError {
    ProcessingError::InvalidUpload(format!("Could not read upload: {error}"))
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    doc_id: String,
    question: String,
    #[serde(default)]
    history: Vec<ConversationTurn>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    citations: Vec<Citation>,
}

async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError>
where
    S: RagApi,
{
    let answer = service
        .ask(&request.doc_id, &request.question, &request.history)
        .await
        .map_err(|error| AppError::new(error, "Failed to generate answer."))?;
    Ok(Json(AskResponse {
        answer: answer.answer,
        citations: answer.citations,
    }))
}

#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
}

async fn summarize_document<S>(
    State(service): State<Arc<S>>,
    Path(doc_id): Path<String>,
) -> Result<Json<SummaryResponse>, AppError>
where
    S: RagApi,
{
    let summary = service
        .summarize(&doc_id)
        .await
        .map_err(|error| AppError::new(error, "Failed to generate summary."))?;
    Ok(Json(SummaryResponse { summary }))
}

#[derive(Serialize)]
struct DeleteResponse {
    message: &'static str,
}

async fn delete_document<S>(
    State(service): State<Arc<S>>,
    Path(doc_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError>
where
    S: RagApi,
{
    service
        .delete(&doc_id)
        .await
        .map_err(|error| AppError::new(error, "Failed to delete document."))?;
    Ok(Json(DeleteResponse {
        message: "Document deleted successfully.",
    }))
}

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentMetadata>,
}

async fn list_documents<S>(State(service): State<Arc<S>>) -> Json<DocumentsResponse>
where
    S: RagApi,
{
    Json(DocumentsResponse {
        documents: service.list_documents().await,
    })
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
{
    Json(service.metrics_snapshot())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Pipeline error paired with the message shown when the detail must stay server-side.
struct AppError {
    error: ProcessingError,
    failure_message: &'static str,
}

impl AppError {
    fn new(error: ProcessingError, failure_message: &'static str) -> Self {
        Self {
            error,
            failure_message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.error {
            ProcessingError::DocumentNotFound(doc_id) => {
                tracing::debug!(doc_id = %doc_id, "Document not found");
                (StatusCode::NOT_FOUND, self.error.to_string())
            }
            ProcessingError::InvalidUpload(_) | ProcessingError::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, self.error.to_string())
            }
            ProcessingError::EmptyDocument => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.error.to_string())
            }
            error => {
                tracing::error!(error = %error, "{}", self.failure_message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    self.failure_message.to_string(),
                )
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
