//! HTTP request handlers

use super::manifest::tool_manifest;
use super::types::{
    ActionResponse, ContinueRequest, EnterRequest, ErrorResponse, InstructRequest,
};
use super::ws::{ws_global, ws_session};
use super::AppState;
use crate::coordinator::{HeadlockResponse, SessionCounts};
use crate::session::{SessionError, SessionInfo};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/tools", get(list_tools))
        // Agent side: these block until the operator acts
        .route("/headlock/enter-headlock", post(enter_headlock))
        .route("/headlock/continue-headlock", post(continue_headlock))
        // Operator side
        .route("/sessions", get(list_sessions))
        .route("/sessions/waiting", get(list_waiting_sessions))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/instruct", post(send_instruction))
        .route("/sessions/:id/tap-out", post(tap_out))
        .route("/sessions/:id/complete", post(complete_session))
        // Observers
        .route("/ws", get(ws_global))
        .route("/ws/:id", get(ws_session))
        .with_state(state)
}

// ============================================================
// Service info
// ============================================================

async fn service_info() -> Json<Value> {
    Json(json!({
        "name": "headlock",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "tools": "/tools",
        "ws": "/ws",
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let SessionCounts {
        active_sessions,
        waiting_sessions,
    } = state.coordinator.counts();
    Json(json!({
        "status": "healthy",
        "active_sessions": active_sessions,
        "waiting_sessions": waiting_sessions,
    }))
}

async fn list_tools() -> Json<Value> {
    Json(tool_manifest())
}

// ============================================================
// Agent side
// ============================================================

async fn enter_headlock(
    State(state): State<AppState>,
    Json(req): Json<EnterRequest>,
) -> Json<HeadlockResponse> {
    Json(state.coordinator.enter(req.session_id, req.context).await)
}

async fn continue_headlock(
    State(state): State<AppState>,
    Json(req): Json<ContinueRequest>,
) -> Result<Json<HeadlockResponse>, AppError> {
    let response = state
        .coordinator
        .continue_session(&req.session_id, req.context)
        .await?;
    Ok(Json(response))
}

// ============================================================
// Operator side
// ============================================================

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.coordinator.list())
}

async fn list_waiting_sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.coordinator.list_waiting())
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, AppError> {
    Ok(Json(state.coordinator.get(&id)?))
}

async fn send_instruction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InstructRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    state.coordinator.send_instruction(&id, &req.instruction)?;
    Ok(Json(ActionResponse::ok("Instruction sent")))
}

async fn tap_out(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    state.coordinator.tap_out(&id)?;
    Ok(Json(ActionResponse::ok("Tap out signal sent")))
}

async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    state.coordinator.complete(&id)?;
    Ok(Json(ActionResponse::ok("Session completed")))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    state.coordinator.remove(&id)?;
    Ok(Json(ActionResponse::ok("Session removed")))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::InvalidState { .. } => AppError::BadRequest(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
