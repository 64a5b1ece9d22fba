//! HTTP surface for the document QA pipeline.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /ask` – Answer a question against the indexed corpus. Returns the answer text, the
//!   mode the responder resolved to (`extract` | `summarize`), the QA confidence when present,
//!   and the deduplicated source document identifiers.
//! - `POST /ingest` – Ingest a folder of documents and build (or refresh) the index.
//! - `DELETE /documents/{id}` – Remove every indexed chunk belonging to a document.
//! - `GET /metrics` – Observe ingestion and query counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! The HTTP surface is a thin shell over [`PipelineApi`]; any interactive UI is an external
//! caller of the same `answer` function.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::get_config;
use crate::pipeline::{AnswerError, BuildError, BuildOutcome, PipelineApi};
use crate::responder::Answer;

/// Build the HTTP router exposing the pipeline API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/ask", post(ask::<S>))
        .route("/ingest", post(ingest::<S>))
        .route("/documents/:doc_id", delete(remove_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Request body for the `POST /ask` endpoint.
#[derive(Deserialize)]
struct AskRequest {
    /// Natural-language question to answer against the corpus.
    question: String,
}

/// Answer a question against the indexed corpus.
async fn ask<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Answer>, ApiError>
where
    S: PipelineApi,
{
    let question = request.question.trim().to_string();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".into()));
    }

    let answer = service.answer(&question).await?;
    Ok(Json(answer))
}

/// Request body for the `POST /ingest` endpoint.
#[derive(Deserialize, Default)]
struct IngestRequest {
    /// Folder to ingest; defaults to the configured `DOCS_DIR`.
    #[serde(default)]
    folder: Option<String>,
}

/// Ingest a folder of documents and build the index.
async fn ingest<S>(
    State(service): State<Arc<S>>,
    request: Option<Json<IngestRequest>>,
) -> Result<Json<BuildOutcome>, ApiError>
where
    S: PipelineApi,
{
    let folder = request
        .and_then(|Json(body)| body.folder)
        .or_else(|| get_config().docs_dir.clone())
        .ok_or_else(|| {
            ApiError::BadRequest("no folder provided and DOCS_DIR is not configured".into())
        })?;

    let outcome = service.build_corpus(&PathBuf::from(folder)).await?;
    Ok(Json(outcome))
}

/// Response body for `DELETE /documents/{id}`.
#[derive(Serialize)]
struct RemoveResponse {
    /// Number of chunks removed from the index.
    removed: usize,
}

/// Remove a document's chunks from the index.
async fn remove_document<S>(
    State(service): State<Arc<S>>,
    Path(doc_id): Path<String>,
) -> Json<RemoveResponse>
where
    S: PipelineApi,
{
    let removed = service.remove_document(&doc_id).await;
    Json(RemoveResponse { removed })
}

/// Return a concise metrics snapshot with ingestion and query counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ask",
                method: "POST",
                path: "/ask",
                description: "Answer a question against the indexed corpus. Response returns { \"text\", \"mode\", \"confidence\", \"sources\" }.",
                request_example: Some(json!({
                    "question": "What is the capital of France?"
                })),
            },
            CommandDescriptor {
                name: "ingest",
                method: "POST",
                path: "/ingest",
                description: "Ingest a folder of documents, chunk and embed them, and build the index.",
                request_example: Some(json!({
                    "folder": "/data/papers"
                })),
            },
            CommandDescriptor {
                name: "remove_document",
                method: "DELETE",
                path: "/documents/{id}",
                description: "Remove every indexed chunk belonging to the given document.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion and query counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum ApiError {
    BadRequest(String),
    Answer(AnswerError),
    Build(BuildError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Answer(error) if error.is_index_empty() => {
                (StatusCode::CONFLICT, error.to_string()).into_response()
            }
            Self::Answer(AnswerError::Responder(error)) => {
                (StatusCode::BAD_GATEWAY, error.to_string()).into_response()
            }
            Self::Answer(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
            }
            Self::Build(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
            }
        }
    }
}

impl From<AnswerError> for ApiError {
    fn from(inner: AnswerError) -> Self {
        Self::Answer(inner)
    }
}

impl From<BuildError> for ApiError {
    fn from(inner: BuildError) -> Self {
        Self::Build(inner)
    }
}
