//! Operator broadcast to every active session.

use ::metrics::counter;
use pipe_core::envelope::build_envelopes;
use serde::Serialize;
use tracing::{debug, info};

use super::member::Frame;
use super::registry::SessionRegistry;
use crate::metrics::BROADCASTS_TOTAL;

/// Outcome of a broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Sessions visited.
    pub sessions: usize,
    /// Members that received both envelopes.
    pub recipients: usize,
    /// Members whose queue refused at least one envelope.
    pub failed: usize,
}

/// Frame `text` and send both envelopes, in order, to every member of every
/// active session. Delivery failures are ignored.
pub fn broadcast(registry: &SessionRegistry, text: &str) -> BroadcastReport {
    let envelopes = build_envelopes(text);
    let mut report = BroadcastReport::default();

    for session_id in registry.all_session_ids() {
        let members = registry.members_of(&session_id);
        if members.is_empty() {
            continue;
        }
        report.sessions += 1;
        for member in members {
            let mut ok = true;
            for envelope in &envelopes {
                ok &= member.send(Frame::Text(envelope.clone()));
            }
            if ok {
                report.recipients += 1;
            } else {
                report.failed += 1;
                debug!(%session_id, member_id = %member.id(), "broadcast envelope dropped");
            }
        }
    }

    counter!(BROADCASTS_TOTAL).increment(1);
    info!(
        sessions = report.sessions,
        recipients = report.recipients,
        failed = report.failed,
        "broadcast delivered"
    );
    report
}
