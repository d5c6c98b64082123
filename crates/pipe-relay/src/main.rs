//! # pipe-relay
//!
//! Pipe relay server binary: loads settings, starts the HTTP/WebSocket
//! server, and runs the ordered shutdown on Ctrl-C or once a pending
//! shutdown has drained every session.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pipe_server::{PipeServer, ServerConfig};
use pipe_settings::PipeSettings;

/// Pipe relay server.
#[derive(Parser, Debug)]
#[command(name = "pipe-relay", about = "Session-pairing WebSocket relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (default `~/.pipe/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter, e.g. `info` or `pipe_server=debug`.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, settings: &mut PipeSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = match args.settings {
        Some(ref path) => pipe_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => pipe_settings::load_settings().with_context(|| {
            format!(
                "Failed to load settings from {}",
                pipe_settings::settings_path().display()
            )
        })?,
    };
    args.apply(&mut settings);

    pipe_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let server = PipeServer::new(ServerConfig::from_settings(&settings));
    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;
    tracing::info!("Pipe relay listening on http://{addr}");

    let token = server.shutdown().token();
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for ctrl-c")?;
            tracing::info!("Shutting down...");
        }
        () = token.cancelled() => {
            tracing::info!("Sessions drained, shutting down...");
        }
    }

    server
        .shutdown()
        .graceful_shutdown(
            vec![handle],
            Some(Duration::from_secs(settings.shutdown.timeout_secs)),
        )
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
