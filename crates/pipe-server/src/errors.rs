//! Server error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the server lifecycle and the control surface.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind or inspect the listener.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
    /// The server is draining and no longer accepts new sessions.
    #[error("server is shutting down")]
    ShuttingDown,
    /// A control request could not be parsed.
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Bind(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
