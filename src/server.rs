//! HTTP session server.
//!
//! Exposes document Q&A over a JSON HTTP API. Each session owns one loaded
//! document and its conversation transcript; sessions are independent and
//! questions within a session are answered one at a time.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/sessions` | Create an empty session |
//! | `POST`   | `/sessions/{id}/document` | Load a document (`{"path": ...}`) |
//! | `POST`   | `/sessions/{id}/ask` | Ask a question (`{"question": ...}`) |
//! | `GET`    | `/sessions/{id}/transcript` | Conversation so far |
//! | `POST`   | `/sessions/{id}/reset` | Drop document and transcript |
//! | `DELETE` | `/sessions/{id}` | Remove the session |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_initialized", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `not_initialized` (409),
//! `ingest_failed` (422), `session_limit` (429), `index_error` (500),
//! `routing_error` (500), `internal_error` (500), `classification_failed` (502),
//! `strategy_failed` (502).
//!
//! # Documents
//!
//! Paths sent to the document endpoint are resolved against
//! `[server].documents_root` (the working directory by default). After
//! symlinks are resolved the file must still lie below that root; anything
//! else is a `bad_request`.
//!
//! # Sessions
//!
//! At most `[server].max_sessions` sessions exist at once. Sessions idle for
//! longer than `[server].session_idle_secs` are dropped.
//!
//! # CORS
//!
//! Only the origins listed in `[server].cors_origins` may call the API from
//! a browser. The list is empty by default.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::PipelineError;
use crate::llm::{create_model, LanguageModel};
use crate::models::{RouteLabel, Turn};
use crate::progress::NoProgress;
use crate::session::SessionState;

struct SessionEntry {
    state: Mutex<SessionState>,
    last_used: std::sync::Mutex<Instant>,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::new()),
            last_used: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        if let Ok(mut last_used) = self.last_used.lock() {
            *last_used = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }
}

type Sessions = RwLock<HashMap<Uuid, Arc<SessionEntry>>>;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    model: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    sessions: Arc<Sessions>,
}

impl AppState {
    pub fn new(config: Config, model: Arc<dyn LanguageModel>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config: Arc::new(config),
            model,
            embedder,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn idle_ttl(&self) -> Option<Duration> {
        match self.config.server.session_idle_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    async fn session(&self, id: &str) -> Result<Arc<SessionEntry>, AppError> {
        let uuid = Uuid::parse_str(id).map_err(|_| not_found(format!("no session: {}", id)))?;
        let entry = self
            .sessions
            .read()
            .await
            .get(&uuid)
            .cloned()
            .ok_or_else(|| not_found(format!("no session: {}", id)))?;

        if self.idle_ttl().is_some_and(|ttl| entry.idle_for() >= ttl) {
            self.sessions.write().await.remove(&uuid);
            tracing::debug!(session = %uuid, "session expired");
            return Err(not_found(format!("no session: {}", id)));
        }
        entry.touch();
        Ok(entry)
    }

    /// Resolve a requested document path below the documents root.
    ///
    /// Relative paths are taken from the root. Paths that do not exist but
    /// would lie below the root are passed through so ingestion reports them.
    fn resolve_document(&self, requested: &str) -> Result<PathBuf, AppError> {
        let root = self
            .config
            .server
            .documents_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let root = root.canonicalize().map_err(|e| {
            internal_error(format!(
                "documents_root {} is not accessible: {}",
                root.display(),
                e
            ))
        })?;

        let candidate = root.join(requested);
        let outside = || {
            tracing::warn!(path = requested, "rejected document outside documents_root");
            bad_request(format!("path is outside the documents root: {}", requested))
        };
        match candidate.canonicalize() {
            Ok(path) if path.starts_with(&root) => Ok(path),
            Ok(_) => Err(outside()),
            Err(_) => {
                let escapes = candidate
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir));
                if !escapes && candidate.starts_with(&root) {
                    Ok(candidate)
                } else {
                    Err(outside())
                }
            }
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the router with all session endpoints.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", axum::routing::delete(handle_delete_session))
        .route("/sessions/{id}/document", post(handle_load_document))
        .route("/sessions/{id}/ask", post(handle_ask))
        .route("/sessions/{id}/transcript", get(handle_transcript))
        .route("/sessions/{id}/reset", post(handle_reset))
        .layer(cors)
        .with_state(state)
}

/// Starts the session server on `[server].bind` with the configured providers.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let model = create_model(&config.llm)?;
    let embedder = create_embedder(&config.embedding)?;
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config.clone(), model, embedder);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(bind = %bind_addr, "session server listening");
    println!("askdoc server listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn session_limit(max: usize) -> AppError {
    AppError {
        status: StatusCode::TOO_MANY_REQUESTS,
        code: "session_limit".to_string(),
        message: format!("session limit reached ({} open); delete a session first", max),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    let message = message.into();
    tracing::error!(error = %message, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal_error".to_string(),
        message,
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::NotInitialized => StatusCode::CONFLICT,
            PipelineError::Ingest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Index(_) | PipelineError::Routing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::Classification(_) | PipelineError::Strategy { .. } => {
                StatusCode::BAD_GATEWAY
            }
        };
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
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

// ============ POST /sessions ============

#[derive(Serialize)]
struct SessionCreated {
    id: String,
}

async fn handle_create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionCreated>), AppError> {
    let mut sessions = state.sessions.write().await;

    if let Some(ttl) = state.idle_ttl() {
        sessions.retain(|id, entry| {
            let live = entry.idle_for() < ttl;
            if !live {
                tracing::debug!(session = %id, "session expired");
            }
            live
        });
    }
    let max = state.config.server.max_sessions;
    if sessions.len() >= max {
        return Err(session_limit(max));
    }

    let id = Uuid::new_v4();
    sessions.insert(id, Arc::new(SessionEntry::new()));
    tracing::debug!(session = %id, open = sessions.len(), "session created");
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated { id: id.to_string() }),
    ))
}

// ============ DELETE /sessions/{id} ============

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let uuid = Uuid::parse_str(&id).map_err(|_| not_found(format!("no session: {}", id)))?;
    state
        .sessions
        .write()
        .await
        .remove(&uuid)
        .ok_or_else(|| not_found(format!("no session: {}", id)))?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /sessions/{id}/document ============

#[derive(Deserialize)]
struct LoadRequest {
    path: String,
}

#[derive(Serialize)]
struct LoadResponse {
    path: String,
    content_type: String,
    fingerprint: String,
    pages: usize,
    segments: usize,
}

async fn handle_load_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LoadRequest>,
) -> Result<Json<LoadResponse>, AppError> {
    if req.path.trim().is_empty() {
        return Err(bad_request("path must not be empty"));
    }
    let path = state.resolve_document(req.path.trim())?;
    let session = state.session(&id).await?;
    let mut session = session.state.lock().await;

    let pipeline = session
        .initialize(
            &state.config,
            &path,
            state.model.clone(),
            state.embedder.clone(),
            &NoProgress,
        )
        .await?;

    let document = pipeline.document();
    Ok(Json(LoadResponse {
        path: document.path.display().to_string(),
        content_type: document.content_type.clone(),
        fingerprint: document.fingerprint.clone(),
        pages: document.pages.len(),
        segments: pipeline.index().len(),
    }))
}

// ============ POST /sessions/{id}/ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    route: RouteLabel,
    answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let session = state.session(&id).await?;
    let answer = session.state.lock().await.ask(&req.question).await?;
    Ok(Json(AskResponse {
        route: answer.route,
        answer: answer.text,
    }))
}

// ============ GET /sessions/{id}/transcript ============

#[derive(Serialize)]
struct TranscriptResponse {
    initialized: bool,
    turns: Vec<Turn>,
}

async fn handle_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptResponse>, AppError> {
    let session = state.session(&id).await?;
    let session = session.state.lock().await;
    Ok(Json(TranscriptResponse {
        initialized: session.is_initialized(),
        turns: session.transcript().turns().to_vec(),
    }))
}

// ============ POST /sessions/{id}/reset ============

async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let session = state.session(&id).await?;
    session.state.lock().await.reset();
    Ok(StatusCode::NO_CONTENT)
}
