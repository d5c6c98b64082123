//! Heartbeat pong-timeout monitoring.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::relay::Member;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The member stopped responding within the timeout window.
    TimedOut,
    /// The member was closed for another reason.
    Closed,
}

/// Watch a member's pong clock.
///
/// Checks every `interval`; once the member has been silent for longer than
/// `timeout` it is closed and `TimedOut` is returned.
pub async fn run_heartbeat(
    member: Arc<Member>,
    interval: Duration,
    timeout: Duration,
) -> HeartbeatResult {
    let mut check = time::interval(interval);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let _ = check.tick().await;

    loop {
        tokio::select! {
            _ = check.tick() => {
                if member.last_pong_elapsed() > timeout {
                    member.close();
                    return HeartbeatResult::TimedOut;
                }
            }
            () = member.closed() => return HeartbeatResult::Closed,
        }
    }
}
