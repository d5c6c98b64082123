//! `GET /{session_id}` upgrade into a member connection.

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use pipe_core::SessionId;
use tracing::debug;

use super::session::{SessionLimits, run_member_session};
use crate::errors::ServerError;
use crate::server::AppState;

/// Whether the request carries a truthy controller flag in `header`.
///
/// Accepts `1`, `true`, `yes` and `on`, case-insensitively.
pub fn is_controller(headers: &HeaderMap, header: &str) -> bool {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .is_some_and(|v| {
            ["1", "true", "yes", "on"]
                .iter()
                .any(|t| v.eq_ignore_ascii_case(t))
        })
}

/// Upgrade the request and run it as a member of `session_id`.
pub async fn ws_upgrade_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return ServerError::ShuttingDown.into_response();
    }

    let controller = is_controller(&headers, &state.config.controller_header);
    let session_id = SessionId::from_raw(session_id);
    let limits = SessionLimits::from_config(&state.config);
    let engine = state.engine.clone();
    debug!(%session_id, controller, "websocket upgrade requested");

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_member_session(socket, session_id, controller, engine, limits))
}
