use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use docreader_rag::{DocumentPipeline, RagError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{config::ServerConfig, storage::UploadStore};

/// Body returned by a successful `POST /upload`.
pub const UPLOAD_OK: &str = "Document indexed successfully";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DocumentPipeline>,
    pub uploads: UploadStore,
    pub max_upload_bytes: usize,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("uploads", &self.uploads).finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(pipeline: DocumentPipeline, uploads: UploadStore) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            uploads,
            max_upload_bytes: ServerConfig::default().max_upload_bytes,
        }
    }

    pub fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskQuery {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

/// A failed request, rendered as `{"error": message}` with a mapped status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RagError::Extraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RagError::Embedding { .. } | RagError::Generation { .. } => StatusCode::BAD_GATEWAY,
            RagError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RagError::Index(_) | RagError::Config(_) | RagError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "request rejected");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/ask", post(ask))
        .with_state(state)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let pipeline = config.build_pipeline().context("failed to build document pipeline")?;
    let state = AppState::new(pipeline, UploadStore::new(&config.upload_dir))
        .with_upload_limit(config.max_upload_bytes);
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docreader-server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        upload_dir = %config.upload_dir.display(),
        embedder = ?config.embedder,
        llm_model = %config.llm_model,
        "docreader-server listening on http://{}",
        addr
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let indexed_chunks = state.pipeline.index().len().await;
    Json(json!({"status":"ok","service":"docreader-server","indexed_chunks": indexed_chunks}))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError { status: e.status(), message: e.body_text() })?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| ApiError::bad_request("multipart field 'file' has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError { status: e.status(), message: e.body_text() })?;

        let stored = state.uploads.save(&filename, &bytes).await?;
        let report = state.pipeline.ingest_file(&stored.path).await?;
        info!(
            filename = %filename,
            bytes = bytes.len(),
            chunk_count = report.chunk_count,
            corpus_size = report.corpus_size,
            "document indexed"
        );
        return Ok(Json(UploadResponse { status: UPLOAD_OK.to_string() }));
    }

    Err(ApiError::bad_request("missing multipart field 'file'"))
}

async fn ask(
    State(state): State<AppState>,
    query: Result<Query<AskQuery>, QueryRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Query(AskQuery { question }) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let answer = state.pipeline.ask(&question).await?;
    Ok(Json(AskResponse { answer: answer.answer }))
}
