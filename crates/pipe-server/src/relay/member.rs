//! One live connection inside a session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use pipe_core::MemberId;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// A relayed message. The frame kind is preserved end to end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
}

impl Frame {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry-side handle to a member connection.
///
/// The socket itself is owned by the transport task; the registry only
/// queues frames onto it and requests closure.
pub struct Member {
    id: MemberId,
    controller: bool,
    tx: mpsc::Sender<Frame>,
    close: CancellationToken,
    connected_at: Instant,
    last_pong: Mutex<Instant>,
    dropped: AtomicU64,
}

impl Member {
    /// Wrap an outbound queue as a member.
    pub fn new(controller: bool, tx: mpsc::Sender<Frame>) -> Self {
        let now = Instant::now();
        Self {
            id: MemberId::new(),
            controller,
            tx,
            close: CancellationToken::new(),
            connected_at: now,
            last_pong: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a member together with the receiving end of its queue.
    pub fn channel(controller: bool, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self::new(controller, tx)), rx)
    }

    /// Member id.
    pub fn id(&self) -> &MemberId {
        &self.id
    }

    /// Whether this member's departure ends the session.
    pub fn is_controller(&self) -> bool {
        self.controller
    }

    /// Queue a frame without waiting.
    ///
    /// Returns `false` (and counts a drop) when the queue is full or closed.
    pub fn send(&self, frame: Frame) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Ask the transport to close this connection. Idempotent.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Whether closure has been requested.
    pub fn is_closing(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Resolves once closure has been requested.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.close.cancelled()
    }

    /// Frames dropped for this member.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record a pong (or any proof of life).
    pub fn mark_alive(&self) {
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last pong or since connecting.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("id", &self.id)
            .field("controller", &self.controller)
            .field("closing", &self.is_closing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_queues_frame() {
        let (member, mut rx) = Member::channel(false, 8);
        assert!(member.send(Frame::Text("hello".into())));
        assert_eq!(rx.recv().await.unwrap(), Frame::Text("hello".into()));
    }

    #[test]
    fn send_to_full_queue_counts_drop() {
        let (member, _rx) = Member::channel(false, 1);
        assert!(member.send(Frame::Text("a".into())));
        assert!(!member.send(Frame::Text("b".into())));
        assert_eq!(member.drop_count(), 1);
    }

    #[test]
    fn send_to_closed_queue_counts_drop() {
        let (member, rx) = Member::channel(false, 4);
        drop(rx);
        assert!(!member.send(Frame::Binary(Bytes::from_static(b"\x01"))));
        assert_eq!(member.drop_count(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_observable() {
        let (member, _rx) = Member::channel(true, 4);
        assert!(member.is_controller());
        assert!(!member.is_closing());
        member.close();
        member.close();
        assert!(member.is_closing());
        member.closed().await;
    }

    #[test]
    fn members_get_distinct_ids() {
        let (a, _ra) = Member::channel(false, 1);
        let (b, _rb) = Member::channel(false, 1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn frame_len() {
        assert_eq!(Frame::Text("abc".into()).len(), 3);
        assert!(Frame::Binary(Bytes::new()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn age_counts_from_connect_not_last_pong() {
        let (member, _rx) = Member::channel(false, 1);
        tokio::time::sleep(Duration::from_secs(90)).await;
        member.mark_alive();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(member.age(), Duration::from_secs(100));
        assert_eq!(member.last_pong_elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn mark_alive_resets_pong_clock() {
        let (member, _rx) = Member::channel(false, 1);
        std::thread::sleep(Duration::from_millis(10));
        let before = member.last_pong_elapsed();
        member.mark_alive();
        assert!(member.last_pong_elapsed() < before);
    }
}
