//! HTTP surface for document question answering.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /documents` – Chunk and index raw text into a session (created on demand).
//! - `POST /upload` – Same, for a PDF uploaded as multipart field `file`.
//! - `POST /chat` – Answer a question against a ready session.
//! - `GET /sessions`, `GET /sessions/:id`, `DELETE /sessions/:id` – Inspect or forget sessions.
//! - `GET /metrics` – Ingestion and question counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Failures are returned as `{"error": <kind>, "detail": <message>}` with a status derived from
//! the kind.

use crate::embedding::EmbeddingClientError;
use crate::extract::{ExtractError, ensure_pdf, extract_pdf_text};
use crate::generation::GenerationClientError;
use crate::metrics::MetricsSnapshot;
use crate::processing::{
    ChunkingOverrides, Document, DocumentApi, IngestOutcome, IngestRequest, PipelineError,
    QuestionRequest,
};
use crate::request::CallOptions;
use crate::session::SessionSnapshot;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Build the HTTP router exposing the question answering API.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/documents", post(ingest_document::<S>))
        .route("/upload", post(upload_document::<S>))
        .route("/chat", post(chat::<S>))
        .route("/sessions", get(list_sessions::<S>))
        .route(
            "/sessions/:session_id",
            get(get_session::<S>).delete(delete_session::<S>),
        )
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Request body for `POST /documents`.
#[derive(Deserialize)]
struct IngestBody {
    /// Identifier used as the chunk id prefix.
    document_id: String,
    /// Raw document text.
    text: String,
    /// Target session; generated when omitted.
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    chunk_size: Option<usize>,
    #[serde(default)]
    chunk_overlap: Option<usize>,
    /// Per-request upstream timeout in milliseconds.
    #[serde(default)]
    timeout_ms: Option<u64>,
}

async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    body: Result<Json<IngestBody>, JsonRejection>,
) -> Result<Json<IngestOutcome>, AppError>
where
    S: DocumentApi,
{
    let Json(body) = body?;
    let options = call_options(body.timeout_ms)?;
    let outcome = service
        .ingest(
            IngestRequest {
                session_id: body.session_id,
                document: Document::new(body.document_id, body.text),
                chunking: ChunkingOverrides {
                    chunk_size: body.chunk_size,
                    chunk_overlap: body.chunk_overlap,
                },
            },
            options,
        )
        .await?;
    Ok(Json(outcome))
}

/// Ingest an uploaded PDF.
///
/// The multipart field `file` carries the document and its filename becomes the document id.
/// Optional text fields `session_id` and `timeout_ms` select the session and bound the upstream
/// calls.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<IngestOutcome>, AppError>
where
    S: DocumentApi,
{
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut session_id = None;
    let mut timeout_ms = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                ensure_pdf(field.content_type())?;
                let file_name = field
                    .file_name()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or("upload.pdf")
                    .to_string();
                let bytes = field.bytes().await?;
                upload = Some((file_name, bytes.to_vec()));
            }
            Some("session_id") => {
                session_id = Some(field.text().await?).filter(|id| !id.trim().is_empty());
            }
            Some("timeout_ms") => {
                let raw = field.text().await?;
                let ms = raw.trim().parse::<u64>().map_err(|_| {
                    AppError::bad_request(format!("timeout_ms must be an integer, got {raw:?}"))
                })?;
                timeout_ms = Some(ms);
            }
            _ => {}
        }
    }

    let (document_id, bytes) =
        upload.ok_or_else(|| AppError::bad_request("multipart field 'file' is required"))?;
    let options = call_options(timeout_ms)?;
    tracing::info!(document_id = %document_id, bytes = bytes.len(), "Received upload");
    let text = extract_pdf_text(bytes).await?;
    let outcome = service
        .ingest(
            IngestRequest {
                session_id,
                document: Document::new(document_id, text),
                chunking: ChunkingOverrides::default(),
            },
            options,
        )
        .await?;
    Ok(Json(outcome))
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatBody {
    session_id: String,
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

/// Success response for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    /// Chunks placed into the prompt, most relevant first.
    chunk_ids: Vec<String>,
    dropped_chunks: usize,
}

async fn chat<S>(
    State(service): State<Arc<S>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: DocumentApi,
{
    let Json(body) = body?;
    let options = call_options(body.timeout_ms)?;
    let answer = service
        .answer(
            QuestionRequest {
                session_id: body.session_id,
                question: body.question,
                top_k: body.top_k,
            },
            options,
        )
        .await?;
    Ok(Json(ChatResponse {
        answer: answer.text,
        chunk_ids: answer.chunk_ids,
        dropped_chunks: answer.dropped_chunks,
    }))
}

#[derive(Serialize)]
struct SessionsResponse {
    sessions: Vec<SessionSnapshot>,
}

async fn list_sessions<S>(State(service): State<Arc<S>>) -> Json<SessionsResponse>
where
    S: DocumentApi,
{
    Json(SessionsResponse {
        sessions: service.sessions(),
    })
}

async fn get_session<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError>
where
    S: DocumentApi,
{
    Ok(Json(service.session(&session_id)?))
}

async fn delete_session<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError>
where
    S: DocumentApi,
{
    service.remove_session(&session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Return pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot())
}

fn call_options(timeout_ms: Option<u64>) -> Result<CallOptions, PipelineError> {
    match timeout_ms {
        None => Ok(CallOptions::default()),
        Some(0) => Err(PipelineError::InvalidParameter(
            "timeout_ms must be greater than zero".to_string(),
        )),
        Some(ms) => Ok(CallOptions::default().timeout(Duration::from_millis(ms))),
    }
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
                name: "ingest",
                method: "POST",
                path: "/documents",
                description: "Chunk and embed raw text into a session, replacing its previous document. Returns the session id and chunk count.",
                request_example: Some(json!({
                    "document_id": "handbook.txt",
                    "text": "Document contents",
                    "session_id": "optional-session",
                    "chunk_size": 1000,
                    "chunk_overlap": 200
                })),
            },
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/upload",
                description: "Multipart PDF upload (field 'file', optional 'session_id' and 'timeout_ms'). Text is extracted and ingested like /documents.",
                request_example: None,
            },
            CommandDescriptor {
                name: "chat",
                method: "POST",
                path: "/chat",
                description: "Answer a question using only the document indexed in the session.",
                request_example: Some(json!({
                    "session_id": "optional-session",
                    "question": "What does the handbook say about leave?",
                    "top_k": 4
                })),
            },
            CommandDescriptor {
                name: "list_sessions",
                method: "GET",
                path: "/sessions",
                description: "List sessions with their state and chunk counts.",
                request_example: None,
            },
            CommandDescriptor {
                name: "get_session",
                method: "GET",
                path: "/sessions/:session_id",
                description: "Return one session's state, document id and chunk count.",
                request_example: None,
            },
            CommandDescriptor {
                name: "delete_session",
                method: "DELETE",
                path: "/sessions/:session_id",
                description: "Forget a session and its index.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return ingestion and question counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Pipeline(PipelineError),
    Extraction(ExtractError),
    Multipart(MultipartError),
    BadRequest(String),
}

impl AppError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest(detail.into())
    }

    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Pipeline(error) => (pipeline_status(error), error.kind()),
            Self::Extraction(ExtractError::UnsupportedContentType(_)) => {
                (StatusCode::BAD_REQUEST, "unsupported_media_type")
            }
            Self::Extraction(ExtractError::Pdf(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed")
            }
            Self::Multipart(error) => (error.status(), "bad_request"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Pipeline(error) => error.to_string(),
            Self::Extraction(error) => error.to_string(),
            Self::Multipart(error) => error.body_text(),
            Self::BadRequest(detail) => detail.clone(),
        }
    }
}

fn pipeline_status(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::InvalidParameter(_) | PipelineError::EmptyInput => StatusCode::BAD_REQUEST,
        PipelineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::SessionNotReady { .. } | PipelineError::IngestionFailed { .. } => {
            StatusCode::CONFLICT
        }
        PipelineError::EmbeddingService(EmbeddingClientError::Cancelled)
        | PipelineError::ModelService(GenerationClientError::Cancelled) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PipelineError::EmbeddingService(inner) if inner.is_timeout() => {
            StatusCode::GATEWAY_TIMEOUT
        }
        PipelineError::ModelService(inner) if inner.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::EmbeddingService(_) | PipelineError::ModelService(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let detail = self.detail();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), kind, detail = %detail, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), kind, detail = %detail, "Request rejected");
        }
        (status, Json(json!({ "error": kind, "detail": detail }))).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self::Pipeline(inner)
    }
}

impl From<ExtractError> for AppError {
    fn from(inner: ExtractError) -> Self {
        Self::Extraction(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::Multipart(inner)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        // Syntax, type and content-type rejections all surface as plain bad requests.
        Self::bad_request(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands, pipeline_status};
    use crate::embedding::EmbeddingClientError;
    use crate::generation::GenerationClientError;
    use crate::metrics::MetricsSnapshot;
    use crate::processing::{
        Answer, DocumentApi, IngestOutcome, IngestRequest, PipelineError, QuestionRequest,
    };
    use crate::request::CallOptions;
    use crate::session::{SessionSnapshot, SessionStatus};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[tokio::test]
    async fn commands_catalog_exposes_chat_and_upload() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let chat = commands
            .iter()
            .find(|cmd| cmd.name == "chat")
            .expect("chat command present");

        assert_eq!(chat.method, "POST");
        assert_eq!(chat.path, "/chat");
        assert!(commands.iter().any(|cmd| cmd.path == "/upload"));
        let get_session = commands
            .iter()
            .find(|cmd| cmd.name == "get_session")
            .expect("get_session command present");
        assert_eq!(get_session.method, "GET");
        assert_eq!(get_session.path, "/sessions/:session_id");
        assert!(commands.len() >= 7);
    }

    #[test]
    fn pipeline_errors_map_to_documented_statuses() {
        let cases = [
            (
                PipelineError::InvalidParameter("k".into()),
                StatusCode::BAD_REQUEST,
            ),
            (PipelineError::EmptyInput, StatusCode::BAD_REQUEST),
            (
                PipelineError::SessionNotFound("s".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                PipelineError::SessionNotReady {
                    session_id: "s".into(),
                    state: SessionStatus::Ingesting,
                },
                StatusCode::CONFLICT,
            ),
            (
                PipelineError::IngestionFailed {
                    session_id: "s".into(),
                    reason: "boom".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                PipelineError::EmbeddingService(EmbeddingClientError::Unavailable("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::EmbeddingService(EmbeddingClientError::Timeout("x".into())),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                PipelineError::ModelService(GenerationClientError::Timeout("x".into())),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                PipelineError::ModelService(GenerationClientError::Cancelled),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                PipelineError::ModelService(GenerationClientError::MalformedResponse("x".into())),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(pipeline_status(&error), status, "{error}");
        }
    }

    #[tokio::test]
    async fn documents_route_forwards_overrides_and_timeout() {
        let service = Arc::new(StubDocumentService::default());
        let app = create_router(service.clone());

        let payload = json!({
            "document_id": "notes.txt",
            "text": "Document body",
            "session_id": "s1",
            "chunk_size": 500,
            "chunk_overlap": 50,
            "timeout_ms": 1500
        });
        let response = app
            .oneshot(json_request(Method::POST, "/documents", payload))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["chunk_count"], 3);

        let calls = service.ingests.lock().await;
        assert_eq!(calls.len(), 1);
        let (request, timeout) = &calls[0];
        assert_eq!(request.document.id, "notes.txt");
        assert_eq!(request.chunking.chunk_size, Some(500));
        assert_eq!(request.chunking.chunk_overlap, Some(50));
        assert_eq!(*timeout, Some(Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn chat_returns_answer_and_provenance() {
        let service = Arc::new(StubDocumentService::default());
        let response = create_router(service)
            .oneshot(json_request(
                Method::POST,
                "/chat",
                json!({ "session_id": "s1", "question": "why?" }),
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["answer"], "because");
        assert_eq!(json["chunk_ids"], json!(["doc:0"]));
        assert_eq!(json["dropped_chunks"], 0);
    }

    #[tokio::test]
    async fn chat_on_pending_session_is_a_conflict() {
        let service = Arc::new(StubDocumentService::default());
        let response = create_router(service)
            .oneshot(json_request(
                Method::POST,
                "/chat",
                json!({ "session_id": "pending", "question": "why?" }),
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"], "session_not_ready");
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected() {
        let service = Arc::new(StubDocumentService::default());
        let response = create_router(service)
            .oneshot(json_request(
                Method::POST,
                "/chat",
                json!({ "session_id": "s1", "question": "why?", "timeout_ms": 0 }),
            ))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_parameter");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let service = Arc::new(StubDocumentService::default());
        let response = create_router(service)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "bad_request");
    }

    #[tokio::test]
    async fn mistyped_or_unlabelled_json_is_a_bad_request() {
        let service = Arc::new(StubDocumentService::default());
        let app = create_router(service.clone());

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/documents",
                json!({ "document_id": "notes.txt", "text": "body", "chunk_size": -1 }),
            ))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "bad_request");

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/chat")
                    .body(Body::from(
                        json!({ "session_id": "s1", "question": "why?" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "bad_request");
        assert!(service.ingests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn upload_timeout_field_is_validated_before_extraction() {
        let service = Arc::new(StubDocumentService::default());
        let app = create_router(service.clone());
        let boundary = "docqa-boundary";
        let upload = |timeout: &str| {
            let body = format!(
                "--{boundary}\r\n\
                 Content-Disposition: form-data; name=\"timeout_ms\"\r\n\r\n\
                 {timeout}\r\n\
                 --{boundary}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"notes.pdf\"\r\n\
                 Content-Type: application/pdf\r\n\r\n\
                 %PDF-1.4 truncated\r\n\
                 --{boundary}--\r\n"
            );
            Request::builder()
                .method(Method::POST)
                .uri("/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .expect("request")
        };

        let response = app
            .clone()
            .oneshot(upload("0"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_parameter");

        let response = app
            .oneshot(upload("soon"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "bad_request");
        assert!(service.ingests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected_before_ingestion() {
        let service = Arc::new(StubDocumentService::default());
        let boundary = "docqa-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             plain text\r\n\
             --{boundary}--\r\n"
        );
        let response = create_router(service.clone())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/upload")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "unsupported_media_type");
        assert!(service.ingests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let service = Arc::new(StubDocumentService::default());
        let boundary = "docqa-boundary";
        let body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"session_id\"\r\n\r\n\
             s1\r\n\
             --{boundary}--\r\n"
        );
        let response = create_router(service)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/upload")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "bad_request");
    }

    #[tokio::test]
    async fn session_routes_report_and_remove() {
        let service = Arc::new(StubDocumentService::default());
        let app = create_router(service);

        let response = app
            .clone()
            .oneshot(empty_request(Method::GET, "/sessions/s1"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["state"], "ready");

        let response = app
            .clone()
            .oneshot(empty_request(Method::DELETE, "/sessions/s1"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(empty_request(Method::DELETE, "/sessions/unknown"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "session_not_found");

        let response = app
            .oneshot(empty_request(Method::GET, "/sessions"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["sessions"][0]["session_id"], "s1");
    }

    #[tokio::test]
    async fn metrics_route_serializes_snapshot() {
        let service = Arc::new(StubDocumentService::default());
        let response = create_router(service)
            .oneshot(empty_request(Method::GET, "/metrics"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["documents_ingested"], 1);
        assert_eq!(json["last_chunk_size"], 1000);
    }

    fn json_request(method: Method, uri: &str, payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request")
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json body")
    }

    #[derive(Default)]
    struct StubDocumentService {
        ingests: Mutex<Vec<(IngestRequest, Option<Duration>)>>,
    }

    fn snapshot(session_id: &str) -> SessionSnapshot {
        SessionSnapshot {
            session_id: session_id.to_string(),
            document_id: Some("doc".into()),
            state: SessionStatus::Ready,
            chunk_count: Some(3),
            error: None,
            updated_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[async_trait]
    impl DocumentApi for StubDocumentService {
        async fn ingest(
            &self,
            request: IngestRequest,
            options: CallOptions,
        ) -> Result<IngestOutcome, PipelineError> {
            let outcome = IngestOutcome {
                session_id: request.session_id.clone().unwrap_or_else(|| "generated".into()),
                document_id: request.document.id.clone(),
                chunk_count: 3,
                chunk_size: request.chunking.chunk_size.unwrap_or(1000),
                chunk_overlap: request.chunking.chunk_overlap.unwrap_or(200),
            };
            self.ingests.lock().await.push((request, options.timeout));
            Ok(outcome)
        }

        async fn answer(
            &self,
            request: QuestionRequest,
            _options: CallOptions,
        ) -> Result<Answer, PipelineError> {
            if request.session_id == "pending" {
                return Err(PipelineError::SessionNotReady {
                    session_id: request.session_id,
                    state: SessionStatus::Ingesting,
                });
            }
            Ok(Answer {
                text: "because".into(),
                chunk_ids: vec!["doc:0".into()],
                dropped_chunks: 0,
            })
        }

        fn session(&self, session_id: &str) -> Result<SessionSnapshot, PipelineError> {
            match session_id {
                "s1" => Ok(snapshot(session_id)),
                other => Err(PipelineError::SessionNotFound(other.to_string())),
            }
        }

        fn sessions(&self) -> Vec<SessionSnapshot> {
            vec![snapshot("s1")]
        }

        fn remove_session(&self, session_id: &str) -> Result<(), PipelineError> {
            self.session(session_id).map(|_| ())
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                documents_ingested: 1,
                chunks_indexed: 3,
                ingestion_failures: 0,
                questions_answered: 0,
                question_failures: 0,
                last_chunk_size: Some(1000),
            }
        }
    }
}
