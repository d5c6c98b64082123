//! `PipeServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::control;
use crate::errors::{Result, ServerError};
use crate::health::{self, HealthResponse};
use crate::metrics::RegistryObserver;
use crate::relay::{RelayEngine, SessionRegistry, spawn_reaper};
use crate::shutdown::{ShutdownCoordinator, spawn_drain_watcher};
use crate::websocket::ws_upgrade_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session registry.
    pub registry: Arc<SessionRegistry>,
    /// Relay engine over the registry.
    pub engine: Arc<RelayEngine>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

/// The pipe relay server.
pub struct PipeServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    engine: Arc<RelayEngine>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl PipeServer {
    /// Create a server reporting to the `metrics` facade.
    pub fn new(config: ServerConfig) -> Self {
        Self::from_registry(config, SessionRegistry::new())
    }

    /// Create a server with a custom membership observer.
    pub fn with_observer(config: ServerConfig, observer: Arc<dyn RegistryObserver>) -> Self {
        Self::from_registry(config, SessionRegistry::with_observer(observer))
    }

    fn from_registry(config: ServerConfig, registry: SessionRegistry) -> Self {
        let registry = Arc::new(registry);
        Self {
            config: Arc::new(config),
            engine: Arc::new(RelayEngine::new(registry.clone())),
            registry,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            registry: self.registry.clone(),
            engine: self.engine.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .nest("/api", control::routes())
            .route("/{session_id}", get(ws_upgrade_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the listener and start serving.
    ///
    /// Also starts the reaper and the pending-shutdown watcher. Once the
    /// coordinator fires, the reaper is stopped, every member is closed, and
    /// the listener is released, in that order. Returns the bound address
    /// and the handle of the serving task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(ServerError::Bind)?;
        let addr = listener.local_addr().map_err(ServerError::Bind)?;

        let reaper_cancel = CancellationToken::new();
        let reaper = spawn_reaper(
            self.registry.clone(),
            self.config.reap_interval(),
            self.config.reap_grace(),
            reaper_cancel.clone(),
        );
        let drain = spawn_drain_watcher(
            self.registry.clone(),
            self.shutdown.clone(),
            self.config.drain_poll(),
        );

        let token = self.shutdown.token();
        let registry = self.registry.clone();
        let signal = async move {
            token.cancelled().await;
            reaper_cancel.cancel();
            let _ = reaper.await;
            let closed = registry.close_all();
            info!(closed, "closed all members");
        };

        let router = self.router();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(signal)
                .await
            {
                error!(error = %e, "server error");
            }
            let _ = drain.await;
            info!("server stopped");
        });

        info!(%addr, "pipe server listening");
        Ok((addr, handle))
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the relay engine.
    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.connection_count(),
        state.registry.session_count(),
        state.shutdown.is_pending(),
    ))
}
