//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"draining"` once a pending shutdown was requested.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current member connection count.
    pub connections: usize,
    /// Number of active sessions.
    pub active_sessions: usize,
    /// Whether the server exits once sessions reach zero.
    pub shutdown_pending: bool,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    connections: usize,
    sessions: usize,
    shutdown_pending: bool,
) -> HealthResponse {
    HealthResponse {
        status: if shutdown_pending { "draining" } else { "ok" }.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_sessions: sessions,
        shutdown_pending,
    }
}
