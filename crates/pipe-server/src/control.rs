//! HTTP control surface: mint session ids, broadcast, pending shutdown.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use pipe_core::SessionId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{Result, ServerError};
use crate::relay::{BroadcastReport, broadcast};
use crate::server::AppState;

/// Response to `POST /api/sessions`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    /// Freshly minted session id.
    pub session_id: SessionId,
}

/// Response to `GET /api/sessions`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsSummary {
    /// Active sessions.
    pub sessions: usize,
    /// Active member connections.
    pub connections: usize,
}

/// Body of `POST /api/broadcast`.
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    /// Operator text to frame and deliver.
    pub text: String,
}

/// Response to `POST /api/shutdown`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShutdownStatus {
    /// Always `true` once requested.
    pub pending: bool,
    /// Sessions still open.
    pub sessions: usize,
}

/// Routes mounted under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/broadcast", post(send_broadcast))
        .route("/shutdown", post(request_shutdown))
}

/// POST /api/sessions
async fn create_session(State(state): State<AppState>) -> Result<Json<CreatedSession>> {
    if state.shutdown.is_pending() || state.shutdown.is_shutting_down() {
        return Err(ServerError::ShuttingDown);
    }
    Ok(Json(CreatedSession {
        session_id: SessionId::generate(),
    }))
}

/// GET /api/sessions
async fn list_sessions(State(state): State<AppState>) -> Json<SessionsSummary> {
    Json(SessionsSummary {
        sessions: state.registry.session_count(),
        connections: state.registry.connection_count(),
    })
}

/// POST /api/broadcast
async fn send_broadcast(
    State(state): State<AppState>,
    body: std::result::Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<BroadcastReport>> {
    let Json(request) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    Ok(Json(broadcast(&state.registry, &request.text)))
}

/// POST /api/shutdown
async fn request_shutdown(State(state): State<AppState>) -> (StatusCode, Json<ShutdownStatus>) {
    let sessions = state.registry.session_count();
    if state.shutdown.request_pending() {
        info!(sessions, "pending shutdown requested");
    }
    (
        StatusCode::ACCEPTED,
        Json(ShutdownStatus {
            pending: true,
            sessions,
        }),
    )
}
