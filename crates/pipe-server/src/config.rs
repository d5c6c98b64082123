//! Server configuration.

use std::time::Duration;

use pipe_settings::PipeSettings;
use serde::{Deserialize, Serialize};

/// Configuration for the pipe server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per member.
    pub send_queue_capacity: usize,
    /// Heartbeat ping interval in seconds.
    pub ping_interval_secs: u64,
    /// Disconnect a member after this many seconds without a pong.
    pub pong_timeout_secs: u64,
    /// Lower-case request header carrying the controller flag.
    pub controller_header: String,
    /// Seconds between reaper sweeps.
    pub reap_interval_secs: u64,
    /// Age in seconds after which a lone member is reaped.
    pub reap_grace_secs: u64,
    /// Seconds between drain checks while a shutdown is pending.
    pub drain_poll_secs: u64,
}

/// Loopback with an auto-assigned port, for tests and embedding.
///
/// The deployed listener takes its defaults from `PipeSettings` through
/// [`ServerConfig::from_settings`].
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            send_queue_capacity: 1024,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            controller_header: "x-pipe-controller".into(),
            reap_interval_secs: 600,
            reap_grace_secs: 60,
            drain_poll_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Build a server config from loaded settings.
    pub fn from_settings(settings: &PipeSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_message_size: settings.server.max_message_size,
            send_queue_capacity: settings.server.send_queue_capacity,
            ping_interval_secs: settings.server.ping_interval_secs,
            pong_timeout_secs: settings.server.pong_timeout_secs,
            controller_header: settings.server.controller_header.to_ascii_lowercase(),
            reap_interval_secs: settings.reaper.interval_secs,
            reap_grace_secs: settings.reaper.grace_secs,
            drain_poll_secs: settings.shutdown.drain_poll_secs,
        }
    }

    /// Heartbeat ping interval.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// Pong timeout.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    /// Reaper sweep period.
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }

    /// Orphan grace period.
    pub fn reap_grace(&self) -> Duration {
        Duration::from_secs(self.reap_grace_secs)
    }

    /// Drain poll period.
    pub fn drain_poll(&self) -> Duration {
        Duration::from_secs(self.drain_poll_secs.max(1))
    }
}
