//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, SuccessResponse, VersionResponse,
};
use super::AppState;
use crate::conversation::ConversationSnapshot;
use crate::runtime::SessionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Widget mount
        .route("/api/sessions", post(create_session))
        // Snapshot and unmount
        .route("/api/sessions/:id", get(get_session).delete(discard_session))
        // User submissions
        .route("/api/sessions/:id/messages", post(send_message))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // Liveness and version
        .route("/api/health", get(get_health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session lifecycle
// ============================================================

async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<ConversationSnapshot>) {
    let session = state.sessions.create().await;
    (StatusCode::CREATED, Json(session.snapshot().await))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationSnapshot>, AppError> {
    Ok(Json(state.sessions.snapshot(&id).await?))
}

async fn discard_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.discard(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Chat
// ============================================================

/// Always `queued: true` for a live session; blank or busy submissions are
/// dropped by the session without an error.
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    state.sessions.submit(&id, req.text).await?;
    Ok(Json(ChatResponse { queued: true }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let session = state.sessions.get(&id).await?;
    // Subscribe before the snapshot so nothing falls between the two
    let broadcast_rx = session.subscribe();
    let snapshot = session.snapshot().await;
    Ok(sse_stream(snapshot, broadcast_rx).into_response())
}

async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.sessions.session_count().await,
    })
}

async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Gone(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::Closed(_) => AppError::Gone(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
