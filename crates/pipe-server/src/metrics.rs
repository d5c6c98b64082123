//! Metric names and the registry observer that records them.

use ::metrics::{counter, gauge};
use pipe_core::SessionId;

/// Active member connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "pipe_connections_active";
/// Active sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "pipe_sessions_active";
/// Sessions created total (counter).
pub const SESSIONS_OPENED_TOTAL: &str = "pipe_sessions_opened_total";
/// Orphan sessions closed by the reaper (counter).
pub const REAPED_SESSIONS_TOTAL: &str = "pipe_reaped_sessions_total";
/// Relay deliveries dropped on a full or closed member queue (counter).
pub const RELAY_DROPS_TOTAL: &str = "pipe_relay_drops_total";
/// Operator broadcasts sent (counter).
pub const BROADCASTS_TOTAL: &str = "pipe_broadcasts_total";

/// Receives registry membership changes.
///
/// Called synchronously while the session entry is locked: implementations
/// must not call back into the registry.
pub trait RegistryObserver: Send + Sync {
    /// A member joined `session_id`.
    fn member_joined(&self, _session_id: &SessionId) {}
    /// A member left `session_id`.
    fn member_left(&self, _session_id: &SessionId) {}
    /// `session_id` was created by its first join.
    fn session_opened(&self, _session_id: &SessionId) {}
    /// `session_id` was deleted.
    fn session_closed(&self, _session_id: &SessionId) {}
}

/// Records membership changes through the `metrics` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsObserver;

impl RegistryObserver for MetricsObserver {
    fn member_joined(&self, _session_id: &SessionId) {
        gauge!(CONNECTIONS_ACTIVE).increment(1.0);
    }

    fn member_left(&self, _session_id: &SessionId) {
        gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    }

    fn session_opened(&self, _session_id: &SessionId) {
        gauge!(SESSIONS_ACTIVE).increment(1.0);
        counter!(SESSIONS_OPENED_TOTAL).increment(1);
    }

    fn session_closed(&self, _session_id: &SessionId) {
        gauge!(SESSIONS_ACTIVE).decrement(1.0);
    }
}
