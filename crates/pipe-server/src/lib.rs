//! # pipe-server
//!
//! Session-pairing relay over WebSocket.
//!
//! - [`relay`]: session registry, message fan-out, orphan reaper, operator broadcast
//! - [`websocket`]: per-connection lifecycle (join, relay, heartbeat, disconnect)
//! - [`control`]: HTTP control surface (mint session ids, broadcast, pending shutdown)
//! - Graceful shutdown via [`shutdown::ShutdownCoordinator`]

#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{Result, ServerError};
pub use server::PipeServer;
