//! Graceful shutdown coordination via `CancellationToken`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::relay::SessionRegistry;

/// Bound on the final drain when none is configured.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinates immediate and pending (drain-then-exit) shutdown.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    pending: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            pending: AtomicBool::new(false),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown now.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request shutdown once every session has drained.
    ///
    /// Returns `false` if a drain was already pending.
    pub fn request_pending(&self) -> bool {
        let first = !self.pending.swap(true, Ordering::SeqCst);
        if first {
            info!("shutdown pending, waiting for sessions to drain");
        }
        first
    }

    /// Whether a drain-then-exit shutdown has been requested.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Cancel the token and wait up to `timeout` for `handles` to finish.
    ///
    /// Tasks still running after the timeout are aborted.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        debug!(tasks = handles.len(), ?timeout, "draining server tasks");

        if time::timeout(timeout, futures::future::join_all(handles)).await.is_err() {
            let stragglers = aborts.iter().filter(|h| !h.is_finished()).count();
            warn!(stragglers, "shutdown timed out after {timeout:?}, aborting");
            for handle in &aborts {
                handle.abort();
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Trigger shutdown once a pending drain sees zero sessions.
///
/// Checks every `poll`; exits when the coordinator shuts down for any reason.
pub fn spawn_drain_watcher(
    registry: Arc<SessionRegistry>,
    coordinator: Arc<ShutdownCoordinator>,
    poll: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let token = coordinator.token();
        let mut ticker = time::interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if coordinator.is_pending() && registry.session_count() == 0 {
                        info!("all sessions drained, shutting down");
                        coordinator.shutdown();
                        break;
                    }
                }
                () = token.cancelled() => break,
            }
        }
    })
}
