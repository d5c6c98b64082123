//! Periodic closing of abandoned single-member sessions.

use std::sync::Arc;
use std::time::Duration;

use ::metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::SessionRegistry;
use crate::metrics::REAPED_SESSIONS_TOTAL;

/// Close the lone member of every session older than `grace`.
///
/// Each session is re-read at decision time, so a session that gained a
/// second member since enumeration is left alone. Closing the member hands
/// the session to the ordinary disconnect path. Returns how many members
/// were closed.
pub fn sweep(registry: &SessionRegistry, grace: Duration) -> usize {
    let mut reaped = 0;
    for session_id in registry.all_session_ids() {
        let Some(member) = registry.orphan(&session_id, grace) else {
            continue;
        };
        if member.is_closing() {
            continue;
        }
        info!(%session_id, member_id = %member.id(), "reaping orphan session");
        member.close();
        reaped += 1;
    }
    if reaped > 0 {
        counter!(REAPED_SESSIONS_TOTAL).increment(reaped as u64);
    }
    reaped
}

/// Run [`sweep`] every `interval` until `cancel` fires.
pub fn spawn_reaper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    grace: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be orphaned yet.
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reaped = sweep(&registry, grace);
                    debug!(reaped, sessions = registry.session_count(), "reaper sweep finished");
                }
                () = cancel.cancelled() => {
                    debug!("reaper stopped");
                    break;
                }
            }
        }
    })
}
