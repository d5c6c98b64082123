//! Settings types.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PipeSettings {
    /// Listener and per-connection settings.
    pub server: ServerSettings,
    /// Orphan session reaping.
    pub reaper: ReaperSettings,
    /// Shutdown behaviour.
    pub shutdown: ShutdownSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Listener and per-connection settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per member before messages are dropped.
    pub send_queue_capacity: usize,
    /// Seconds between server Ping frames.
    pub ping_interval_secs: u64,
    /// Seconds without a Pong before a member is disconnected.
    pub pong_timeout_secs: u64,
    /// Request header carrying the controller flag.
    pub controller_header: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            max_message_size: 16 * 1024 * 1024,
            send_queue_capacity: 1024,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            controller_header: "x-pipe-controller".into(),
        }
    }
}

/// Orphan session reaping.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaperSettings {
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Seconds a single-member session may exist before it is reaped.
    pub grace_secs: u64,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            grace_secs: 60,
        }
    }
}

/// Shutdown behaviour.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ShutdownSettings {
    /// Seconds between session-count checks while a shutdown is pending.
    pub drain_poll_secs: u64,
    /// Upper bound on the final drain, in seconds.
    pub timeout_secs: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            drain_poll_secs: 5,
            timeout_secs: 30,
        }
    }
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(PipeSettings::default()).unwrap();
        assert_eq!(json["server"]["maxMessageSize"], 16 * 1024 * 1024);
        assert_eq!(json["server"]["controllerHeader"], "x-pipe-controller");
        assert_eq!(json["reaper"]["graceSecs"], 60);
        assert_eq!(json["shutdown"]["drainPollSecs"], 5);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: PipeSettings =
            serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.reaper, ReaperSettings::default());
    }

    #[test]
    fn serde_roundtrip() {
        let settings = PipeSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: PipeSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
