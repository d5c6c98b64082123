//! In-memory session registry.
//!
//! Each session entry is guarded by its `DashMap` shard lock, so joins and
//! leaves on one session are serialized while unrelated sessions proceed in
//! parallel. An entry exists only while it has at least one member: the
//! removal of the last member and the deletion of the entry happen under the
//! same lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use pipe_core::{MemberId, SessionId};
use tokio::time::Instant;
use tracing::{debug, info};

use super::member::Member;
use crate::metrics::{MetricsObserver, RegistryObserver};

struct SessionEntry {
    created_at: Instant,
    members: Vec<Arc<Member>>,
}

impl SessionEntry {
    fn checked(&self) -> &Self {
        debug_assert!(!self.members.is_empty(), "session entry with no members");
        self
    }
}

/// Result of removing a member from its session.
#[derive(Debug)]
pub struct Departure {
    /// The member that left.
    pub member: Arc<Member>,
    /// Co-members removed with it because it was a controller. The caller
    /// owns closing their connections.
    pub cascade: Vec<Arc<Member>>,
    /// Whether the session entry was deleted.
    pub session_closed: bool,
}

/// Maps session ids to their live members.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
    observer: Arc<dyn RegistryObserver>,
}

impl SessionRegistry {
    /// Create a registry that reports to the `metrics` facade.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(MetricsObserver))
    }

    /// Create a registry with a custom membership observer.
    pub fn with_observer(observer: Arc<dyn RegistryObserver>) -> Self {
        Self {
            sessions: DashMap::new(),
            observer,
        }
    }

    /// Add `member` to `session_id`, creating the session if absent.
    ///
    /// Returns `true` when this join created the session.
    pub fn join(&self, session_id: &SessionId, member: Arc<Member>) -> bool {
        let member_id = member.id().clone();
        let controller = member.is_controller();
        let created = match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(mut entry) => {
                let members = &mut entry.get_mut().members;
                debug_assert!(
                    members.iter().all(|m| m.id() != member.id()),
                    "member joined twice"
                );
                members.push(member);
                self.observer.member_joined(session_id);
                false
            }
            Entry::Vacant(entry) => {
                let _ = entry.insert(SessionEntry {
                    created_at: Instant::now(),
                    members: vec![member],
                });
                self.observer.session_opened(session_id);
                self.observer.member_joined(session_id);
                true
            }
        };

        if created {
            info!(%session_id, %member_id, controller, "session opened");
        } else {
            debug!(%session_id, %member_id, controller, "member joined session");
        }
        created
    }

    /// Remove `member_id` from `session_id`.
    ///
    /// When the departing member is a controller every remaining member is
    /// removed with it and returned in [`Departure::cascade`]. Unknown
    /// sessions or members are a no-op returning `None`.
    pub fn leave(&self, session_id: &SessionId, member_id: &MemberId) -> Option<Departure> {
        let Entry::Occupied(mut entry) = self.sessions.entry(session_id.clone()) else {
            return None;
        };

        let (member, cascade) = {
            let members = &mut entry.get_mut().members;
            let pos = members.iter().position(|m| m.id() == member_id)?;
            let member = members.swap_remove(pos);
            let cascade = if member.is_controller() {
                std::mem::take(members)
            } else {
                Vec::new()
            };
            (member, cascade)
        };

        self.observer.member_left(session_id);
        for _ in &cascade {
            self.observer.member_left(session_id);
        }

        let session_closed = entry.get().members.is_empty();
        if session_closed {
            let _ = entry.remove();
            self.observer.session_closed(session_id);
            info!(%session_id, %member_id, cascaded = cascade.len(), "session closed");
        } else {
            debug!(%session_id, %member_id, "member left session");
        }

        Some(Departure {
            member,
            cascade,
            session_closed,
        })
    }

    /// Snapshot of the members of `session_id` (empty if absent).
    pub fn members_of(&self, session_id: &SessionId) -> Vec<Arc<Member>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.checked().members.clone())
            .unwrap_or_default()
    }

    /// Ids of every active session.
    pub fn all_session_ids(&self) -> HashSet<SessionId> {
        self.sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Time since `session_id` was created.
    pub fn session_age(&self, session_id: &SessionId) -> Option<Duration> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.checked().created_at.elapsed())
    }

    /// Number of members in `session_id` (zero if absent).
    pub fn member_count(&self, session_id: &SessionId) -> usize {
        self.sessions
            .get(session_id)
            .map_or(0, |entry| entry.checked().members.len())
    }

    /// Whether `session_id` is active.
    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Number of active sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of members across all sessions.
    pub fn connection_count(&self) -> usize {
        self.sessions.iter().map(|entry| entry.members.len()).sum()
    }

    /// The sole member of `session_id` if the session has exactly one member
    /// and is older than `grace`. Count and age are read under one lock.
    pub fn orphan(&self, session_id: &SessionId, grace: Duration) -> Option<Arc<Member>> {
        let entry = self.sessions.get(session_id)?;
        let entry = entry.checked();
        match entry.members.as_slice() {
            [lone] if entry.created_at.elapsed() > grace => Some(Arc::clone(lone)),
            _ => None,
        }
    }

    /// Request closure of every member of every session.
    ///
    /// Membership is left to the disconnect path. Returns the number of
    /// members signalled.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        for entry in &self.sessions {
            for member in &entry.members {
                member.close();
                closed += 1;
            }
        }
        closed
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;

    /// Observer that keeps the two gauges the metrics collaborator tracks.
    #[derive(Default)]
    pub(crate) struct CountingObserver {
        pub connections: AtomicI64,
        pub sessions: AtomicI64,
        pub opened: AtomicI64,
    }

    impl RegistryObserver for CountingObserver {
        fn member_joined(&self, _: &SessionId) {
            let _ = self.connections.fetch_add(1, Ordering::SeqCst);
        }
        fn member_left(&self, _: &SessionId) {
            let _ = self.connections.fetch_sub(1, Ordering::SeqCst);
        }
        fn session_opened(&self, _: &SessionId) {
            let _ = self.sessions.fetch_add(1, Ordering::SeqCst);
            let _ = self.opened.fetch_add(1, Ordering::SeqCst);
        }
        fn session_closed(&self, _: &SessionId) {
            let _ = self.sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn counted_registry() -> (Arc<SessionRegistry>, Arc<CountingObserver>) {
        let observer = Arc::new(CountingObserver::default());
        let registry = Arc::new(SessionRegistry::with_observer(observer.clone()));
        (registry, observer)
    }

    fn member(controller: bool) -> Arc<Member> {
        Member::channel(controller, 8).0
    }

    fn sid(s: &str) -> SessionId {
        SessionId::from_raw(s)
    }

    #[test]
    fn first_join_creates_session() {
        let (registry, observer) = counted_registry();
        assert!(registry.join(&sid("s"), member(false)));
        assert!(!registry.join(&sid("s"), member(false)));

        assert_eq!(registry.member_count(&sid("s")), 2);
        assert_eq!(registry.session_count(), 1);
        assert_eq!(observer.opened.load(Ordering::SeqCst), 1);
        assert_eq!(observer.connections.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn last_leave_deletes_session() {
        let (registry, observer) = counted_registry();
        let a = member(false);
        let b = member(false);
        let _ = registry.join(&sid("s"), a.clone());
        let _ = registry.join(&sid("s"), b.clone());

        let first = registry.leave(&sid("s"), a.id()).unwrap();
        assert!(!first.session_closed);
        assert!(registry.all_session_ids().contains(&sid("s")));

        let second = registry.leave(&sid("s"), b.id()).unwrap();
        assert!(second.session_closed);
        assert!(!registry.all_session_ids().contains(&sid("s")));
        assert_eq!(registry.member_count(&sid("s")), 0);
        assert_eq!(observer.sessions.load(Ordering::SeqCst), 0);
        assert_eq!(observer.connections.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn leave_unknown_is_noop() {
        let (registry, observer) = counted_registry();
        let a = member(false);
        assert!(registry.leave(&sid("missing"), a.id()).is_none());

        let _ = registry.join(&sid("s"), a.clone());
        let stranger = member(false);
        assert!(registry.leave(&sid("s"), stranger.id()).is_none());
        assert_eq!(registry.member_count(&sid("s")), 1);

        let _ = registry.leave(&sid("s"), a.id()).unwrap();
        assert!(registry.leave(&sid("s"), a.id()).is_none());
        assert_eq!(observer.connections.load(Ordering::SeqCst), 0);
        assert_eq!(observer.sessions.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn controller_leave_cascades_whole_session() {
        let (registry, observer) = counted_registry();
        let controller = member(true);
        let b = member(false);
        let c = member(false);
        let _ = registry.join(&sid("s"), controller.clone());
        let _ = registry.join(&sid("s"), b.clone());
        let _ = registry.join(&sid("s"), c.clone());

        let departure = registry.leave(&sid("s"), controller.id()).unwrap();
        assert!(departure.session_closed);
        let mut cascaded: Vec<_> = departure.cascade.iter().map(|m| m.id().clone()).collect();
        cascaded.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        let mut expected = vec![b.id().clone(), c.id().clone()];
        expected.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(cascaded, expected);

        assert!(!registry.contains(&sid("s")));
        assert!(registry.leave(&sid("s"), b.id()).is_none());
        assert_eq!(observer.connections.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn non_controller_leave_keeps_controller() {
        let (registry, _) = counted_registry();
        let controller = member(true);
        let b = member(false);
        let _ = registry.join(&sid("s"), controller.clone());
        let _ = registry.join(&sid("s"), b.clone());

        let departure = registry.leave(&sid("s"), b.id()).unwrap();
        assert!(departure.cascade.is_empty());
        assert!(!departure.session_closed);
        let remaining = registry.members_of(&sid("s"));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), controller.id());
    }

    #[test]
    fn replayed_joins_and_leaves_match_net_count() {
        let (registry, observer) = counted_registry();
        let members: Vec<_> = (0..10).map(|_| member(false)).collect();
        for m in &members {
            let _ = registry.join(&sid("s"), m.clone());
        }
        for (i, m) in members.iter().enumerate().take(7) {
            let _ = registry.leave(&sid("s"), m.id());
            // Double leave must not push the count negative.
            let _ = registry.leave(&sid("s"), m.id());
            assert_eq!(registry.member_count(&sid("s")), 10 - (i + 1));
        }
        assert_eq!(registry.member_count(&sid("s")), 3);
        assert_eq!(observer.connections.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn rejoin_after_vacate_creates_new_session() {
        let (registry, observer) = counted_registry();
        let a = member(false);
        let _ = registry.join(&sid("s"), a.clone());
        let _ = registry.leave(&sid("s"), a.id());
        assert!(registry.join(&sid("s"), member(false)));
        assert_eq!(observer.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn orphan_requires_single_member_and_age() {
        let (registry, _) = counted_registry();
        let a = member(false);
        let _ = registry.join(&sid("s"), a.clone());

        assert!(registry.orphan(&sid("s"), Duration::from_secs(60)).is_none());
        let lone = registry.orphan(&sid("s"), Duration::ZERO).unwrap();
        assert_eq!(lone.id(), a.id());

        let _ = registry.join(&sid("s"), member(false));
        assert!(registry.orphan(&sid("s"), Duration::ZERO).is_none());
        assert!(registry.orphan(&sid("absent"), Duration::ZERO).is_none());
    }

    #[test]
    fn session_age_and_counts() {
        let (registry, _) = counted_registry();
        assert!(registry.session_age(&sid("s")).is_none());
        let _ = registry.join(&sid("s"), member(false));
        let _ = registry.join(&sid("t"), member(false));
        let _ = registry.join(&sid("t"), member(false));
        assert!(registry.session_age(&sid("s")).is_some());
        assert_eq!(registry.session_count(), 2);
        assert_eq!(registry.connection_count(), 3);
    }

    #[test]
    fn close_all_signals_every_member() {
        let (registry, _) = counted_registry();
        let members: Vec<_> = (0..4).map(|_| member(false)).collect();
        let _ = registry.join(&sid("a"), members[0].clone());
        let _ = registry.join(&sid("a"), members[1].clone());
        let _ = registry.join(&sid("b"), members[2].clone());
        let _ = registry.join(&sid("c"), members[3].clone());

        assert_eq!(registry.close_all(), 4);
        assert!(members.iter().all(|m| m.is_closing()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_and_leaves_lose_no_updates() {
        let (registry, observer) = counted_registry();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let m = member(false);
                    let _ = registry.join(&sid("hot"), m.clone());
                    tokio::task::yield_now().await;
                    let _ = registry.leave(&sid("hot"), m.id()).unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(!registry.contains(&sid("hot")));
        assert_eq!(observer.connections.load(Ordering::SeqCst), 0);
        assert_eq!(observer.sessions.load(Ordering::SeqCst), 0);
    }
}
