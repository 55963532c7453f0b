//! HTTP surface: stateless /chat and /qa endpoints plus the session API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::chat::{
    ChatPhase, CollectStage, ConversationTurn, QaStage, SessionManager,
};
use crate::error::{ChatError, RetrievalError};
use crate::profile::{ProfileField, UserProfile};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub collect: Arc<CollectStage>,
    pub qa: Arc<QaStage>,
}

/// Build the router with the stateless chat endpoints and session API.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/qa", post(qa))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}/messages", post(post_message))
        .route("/api/sessions/{id}", get(get_session))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "hmo-chat"
    }))
}

// ── Stateless endpoints ─────────────────────────────────────────────────

/// Request body for POST /chat. The caller carries the history; the
/// server keeps nothing between calls.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
    pub user_prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub content: String,
    pub user_info: UserProfile,
    pub missing_fields: Vec<ProfileField>,
}

/// POST /chat
///
/// One collection turn: extract and validate profile fields from the
/// conversation so far plus the latest message.
async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> impl IntoResponse {
    match state.collect.collect(&req.messages, &req.user_prompt).await {
        Ok(outcome) => Json(ChatResponse {
            content: outcome.reply,
            user_info: outcome.candidate,
            missing_fields: outcome.missing_fields,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct QaRequest {
    pub user_prompt: String,
    pub user_info: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct QaResponse {
    pub content: String,
}

/// POST /qa
///
/// Answer a coverage question for a confirmed profile. An unconfirmed or
/// incomplete profile is rejected before anything is retrieved.
async fn qa(State(state): State<AppState>, Json(req): Json<QaRequest>) -> impl IntoResponse {
    if !req.user_info.is_confirmed || !req.user_info.is_complete() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": "user_info must be complete and confirmed",
                "missing_fields": req.user_info.missing_fields(),
            })),
        )
            .into_response();
    }

    match state.qa.answer(&req.user_info, &req.user_prompt).await {
        Ok(content) => Json(QaResponse { content }).into_response(),
        Err(e) => error_response(e),
    }
}

// ── Session API ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    session_id: Uuid,
}

/// POST /api/sessions
async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session_id = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id }),
    )
}

#[derive(Debug, Deserialize)]
pub struct SessionMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SessionMessageResponse {
    pub content: String,
    pub phase: ChatPhase,
    pub missing_fields: Vec<ProfileField>,
}

/// POST /api/sessions/{id}/messages
async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SessionMessageRequest>,
) -> impl IntoResponse {
    match state.sessions.handle_message(id, &req.content).await {
        Ok(output) => {
            info!(session_id = %id, phase = %output.phase, "Handled session turn");
            Json(SessionMessageResponse {
                content: output.reply,
                phase: output.phase,
                missing_fields: output.missing_fields,
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/sessions/{id}
async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.sessions.status(id).await {
        Some(status) => Json(status).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Session not found"})),
        )
            .into_response(),
    }
}

// ── Error mapping ───────────────────────────────────────────────────────

fn error_response(e: ChatError) -> axum::response::Response {
    let status = match &e {
        ChatError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ChatError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ChatError::UpstreamTimeout
        | ChatError::UpstreamUnavailable { .. }
        | ChatError::Retrieval(RetrievalError::IndexUnavailable { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %e, "Request failed");
    }
    (status, Json(serde_json::json!({"error": e.to_string()}))).into_response()
}
