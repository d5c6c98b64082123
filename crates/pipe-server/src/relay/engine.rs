//! Message fan-out and disconnect handling.

use std::sync::Arc;

use ::metrics::counter;
use pipe_core::{MemberId, SessionId};
use tracing::{info, trace, warn};

use super::member::Frame;
use super::registry::{Departure, SessionRegistry};
use crate::metrics::RELAY_DROPS_TOTAL;

/// Outcome of relaying one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    /// Recipients the frame was queued for.
    pub delivered: usize,
    /// Recipients whose queue was full or closed.
    pub dropped: usize,
}

/// Routes frames between co-members of a session.
pub struct RelayEngine {
    registry: Arc<SessionRegistry>,
}

impl RelayEngine {
    /// Create an engine over `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this engine routes through.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Deliver `frame` from `sender` to every other member of `session_id`.
    ///
    /// Frames with no recipient are dropped. A recipient whose queue refuses
    /// the frame is closed, so its stream ends instead of skipping a frame;
    /// other recipients and the sender are unaffected.
    pub fn relay(&self, session_id: &SessionId, sender: &MemberId, frame: Frame) -> RelayReport {
        let mut report = RelayReport::default();
        for member in self.registry.members_of(session_id) {
            if member.id() == sender {
                continue;
            }
            if member.send(frame.clone()) {
                report.delivered += 1;
            } else {
                report.dropped += 1;
                counter!(RELAY_DROPS_TOTAL).increment(1);
                if !member.is_closing() {
                    warn!(%session_id, member_id = %member.id(), "relay queue overflow, closing member");
                }
                member.close();
            }
        }
        trace!(
            %session_id,
            %sender,
            bytes = frame.len(),
            delivered = report.delivered,
            dropped = report.dropped,
            "relayed frame"
        );
        report
    }

    /// Remove `member_id` from `session_id` after its connection ended.
    ///
    /// If it was a controller, every co-member captured at removal time is
    /// asked to close.
    pub fn disconnect(&self, session_id: &SessionId, member_id: &MemberId) -> Option<Departure> {
        let departure = self.registry.leave(session_id, member_id)?;
        if !departure.cascade.is_empty() {
            info!(
                %session_id,
                %member_id,
                closing = departure.cascade.len(),
                "controller left, closing session members"
            );
            for member in &departure.cascade {
                member.close();
            }
        }
        Some(departure)
    }
}
