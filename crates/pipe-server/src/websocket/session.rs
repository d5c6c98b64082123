//! Member connection lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use pipe_core::SessionId;
use tokio::time;
use tracing::{debug, info, instrument, warn};

use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::config::ServerConfig;
use crate::relay::{Frame, Member, RelayEngine};

/// How long the writer may take to flush its Close frame after disconnect.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection limits taken from [`ServerConfig`].
#[derive(Clone, Copy, Debug)]
pub struct SessionLimits {
    /// Outbound queue depth.
    pub queue_capacity: usize,
    /// Ping period.
    pub ping_interval: Duration,
    /// Silence after which the member is dropped.
    pub pong_timeout: Duration,
}

impl SessionLimits {
    /// Extract limits from the server config.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            queue_capacity: config.send_queue_capacity,
            ping_interval: config.ping_interval(),
            pong_timeout: config.pong_timeout(),
        }
    }
}

fn into_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
    }
}

/// Run one member connection of `session_id`.
///
/// 1. Joins the session
/// 2. Relays inbound Text/Binary frames to co-members
/// 3. Forwards the member's queue to the socket, with periodic Pings
/// 4. On Close, socket error, pong timeout or force-close, leaves the
///    session and closes any cascaded co-members
#[instrument(skip_all, fields(%session_id, controller = controller))]
pub async fn run_member_session(
    ws: WebSocket,
    session_id: SessionId,
    controller: bool,
    engine: Arc<RelayEngine>,
    limits: SessionLimits,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (member, mut queue) = Member::channel(controller, limits.queue_capacity);
    let member_id = member.id().clone();

    let created = engine.registry().join(&session_id, member.clone());
    info!(%member_id, created, "member connected");

    let heartbeat = tokio::spawn(run_heartbeat(
        member.clone(),
        limits.ping_interval,
        limits.pong_timeout,
    ));

    let writer_member = member.clone();
    let writer = tokio::spawn(async move {
        let mut ping = time::interval(limits.ping_interval);
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                biased;
                () = writer_member.closed() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                frame = queue.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(into_message(frame)).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        writer_member.close();
    });

    loop {
        let next = tokio::select! {
            () = member.closed() => break,
            next = ws_rx.next() => next,
        };
        let frame = match next {
            Some(Ok(Message::Text(text))) => Frame::Text(text.as_str().to_owned()),
            Some(Ok(Message::Binary(data))) => Frame::Binary(data),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                member.mark_alive();
                continue;
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!(%member_id, "peer closed connection");
                break;
            }
            Some(Err(err)) => {
                debug!(%member_id, error = %err, "websocket read failed");
                break;
            }
        };
        member.mark_alive();
        let _ = engine.relay(&session_id, &member_id, frame);
    }

    let _ = engine.disconnect(&session_id, &member_id);
    member.close();

    if time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        warn!(%member_id, "writer did not finish after disconnect");
    }
    if let Ok(HeartbeatResult::TimedOut) = heartbeat.await {
        warn!(%member_id, timeout = ?limits.pong_timeout, "member unresponsive, disconnected");
    }
    info!(%member_id, connected_for = ?member.age(), "member disconnected");
}
