//! WebSocket member connections: upgrade, relay loop, and heartbeat.

pub mod handler;
pub mod heartbeat;
pub mod session;

pub use handler::{is_controller, ws_upgrade_handler};
pub use session::{SessionLimits, run_member_session};
