//! Membership of open sessions belonging to one unit.
//!
//! # Responsibilities
//! - Accept new sessions and hand the peer half to the upgrade
//! - Disconnect individual sessions
//! - Broadcast a frame to every member, isolating per-member failures
//! - Close every member on shutdown
//!
//! # Design Decisions
//! - Membership is copy-on-write (`ArcSwap` + read-copy-update)
//! - A broadcast walks one snapshot; concurrent joins and leaves never disturb it
//! - A member whose send fails is treated as closed and dropped

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::observability::metrics;
use crate::sessions::session::{Connection, Frame, Peer, Session, SessionId};

/// Close code and reason sent to disconnected sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseReason {
    pub code: Option<u16>,
    pub reason: Option<String>,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: Some(reason.into()),
        }
    }
}

/// The set of open sessions of one unit.
pub struct SessionPool<C = Session> {
    members: ArcSwap<Vec<Arc<C>>>,
}

impl<C> Default for SessionPool<C> {
    fn default() -> Self {
        Self {
            members: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

impl<C: Connection> std::fmt::Debug for SessionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<SessionId> = self.members.load().iter().map(|c| c.id()).collect();
        f.debug_struct("SessionPool").field("members", &ids).finish()
    }
}

impl<C: Connection> SessionPool<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an already-open connection.
    pub fn join(&self, connection: Arc<C>) {
        self.members.rcu(|members| {
            let mut next = Vec::with_capacity(members.len() + 1);
            next.extend(members.iter().cloned());
            next.push(Arc::clone(&connection));
            next
        });
        tracing::debug!(session = %connection.id(), "Session joined");
        self.report();
    }

    /// Close `connection` and remove it from the pool.
    pub fn disconnect(&self, connection: &Arc<C>, reason: &CloseReason) {
        self.disconnect_many(std::slice::from_ref(connection), reason);
    }

    /// Close and remove several connections at once.
    pub fn disconnect_many(&self, connections: &[Arc<C>], reason: &CloseReason) {
        let ids: Vec<SessionId> = connections.iter().map(|c| c.id()).collect();
        self.remove(&ids);
        for connection in connections {
            connection.close(reason.code, reason.reason.as_deref());
        }
        tracing::debug!(count = ids.len(), "Sessions disconnected");
    }

    /// Send `frame` to every member not in `exclude`.
    ///
    /// Returns how many members received it. Members whose send fails are dropped.
    pub fn broadcast(&self, frame: &Frame, exclude: &[SessionId]) -> usize {
        let snapshot = self.members.load_full();
        let mut delivered = 0;
        let mut failed = Vec::new();

        for member in snapshot.iter() {
            let id = member.id();
            if exclude.contains(&id) {
                continue;
            }
            match member.send(frame) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(session = %id, error = %e, "Dropping session after failed send");
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            metrics::record_broadcast_dropped(failed.len());
            self.remove(&failed);
        }
        delivered
    }

    /// Take the whole membership, leaving the pool empty, and close every member.
    pub fn close_all(&self, reason: &CloseReason) {
        let members = self.members.swap(Arc::new(Vec::new()));
        for member in members.iter() {
            member.close(reason.code, reason.reason.as_deref());
        }
        tracing::info!(count = members.len(), "Closed all sessions");
        self.report();
    }

    pub fn len(&self) -> usize {
        self.members.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.load().is_empty()
    }

    /// Snapshot of the current members.
    pub fn members(&self) -> Arc<Vec<Arc<C>>> {
        self.members.load_full()
    }

    fn remove(&self, ids: &[SessionId]) {
        self.members.rcu(|members| {
            members
                .iter()
                .filter(|m| !ids.contains(&m.id()))
                .cloned()
                .collect::<Vec<_>>()
        });
        self.report();
    }

    fn report(&self) {
        metrics::set_sessions(self.len());
    }
}

impl SessionPool<Session> {
    /// Open a new session, add it to the pool, run `setup` on it, and return its peer.
    pub fn accept<F>(&self, setup: F) -> Peer
    where
        F: FnOnce(&Arc<Session>),
    {
        let (session, peer) = Session::pair();
        let session = Arc::new(session);
        self.join(Arc::clone(&session));
        setup(&session);
        peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records frames; optionally refuses every send.
    struct Member {
        id: SessionId,
        broken: bool,
        received: Mutex<Vec<Frame>>,
        closed: Mutex<Option<Option<u16>>>,
    }

    impl Member {
        fn new(broken: bool) -> Arc<Self> {
            Arc::new(Self {
                id: Uuid::new_v4(),
                broken,
                received: Mutex::new(Vec::new()),
                closed: Mutex::new(None),
            })
        }
    }

    impl Connection for Member {
        fn id(&self) -> SessionId {
            self.id
        }

        fn send(&self, frame: &Frame) -> Result<(), SessionError> {
            if self.broken {
                return Err(SessionError::Closed(self.id));
            }
            self.received.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn close(&self, code: Option<u16>, _reason: Option<&str>) {
            *self.closed.lock().unwrap() = Some(code);
        }
    }

    #[test]
    fn test_broadcast_drops_failed_member_only() {
        let pool = SessionPool::<Member>::new();
        let first = Member::new(false);
        let second = Member::new(true);
        let third = Member::new(false);
        pool.join(Arc::clone(&first));
        pool.join(Arc::clone(&second));
        pool.join(Arc::clone(&third));

        let delivered = pool.broadcast(&Frame::from("hello"), &[]);

        assert_eq!(delivered, 2);
        assert_eq!(pool.len(), 2);
        assert_eq!(*first.received.lock().unwrap(), vec![Frame::from("hello")]);
        assert_eq!(*third.received.lock().unwrap(), vec![Frame::from("hello")]);
        let ids: Vec<_> = pool.members().iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec![first.id, third.id]);
    }

    #[test]
    fn test_broadcast_exclude() {
        let pool = SessionPool::<Member>::new();
        let a = Member::new(false);
        let b = Member::new(false);
        pool.join(Arc::clone(&a));
        pool.join(Arc::clone(&b));

        assert_eq!(pool.broadcast(&Frame::from("x"), &[a.id]), 1);
        assert!(a.received.lock().unwrap().is_empty());
        assert_eq!(b.received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_disconnect_closes_and_removes() {
        let pool = SessionPool::<Member>::new();
        let a = Member::new(false);
        let b = Member::new(false);
        pool.join(Arc::clone(&a));
        pool.join(Arc::clone(&b));

        pool.disconnect(&a, &CloseReason::new(4000, "kicked"));

        assert_eq!(pool.len(), 1);
        assert_eq!(*a.closed.lock().unwrap(), Some(Some(4000)));
        assert!(b.closed.lock().unwrap().is_none());
    }

    #[test]
    fn test_close_all_empties_pool() {
        let pool = SessionPool::<Member>::new();
        let members: Vec<_> = (0..3).map(|_| Member::new(false)).collect();
        for m in &members {
            pool.join(Arc::clone(m));
        }

        pool.close_all(&CloseReason::default());

        assert!(pool.is_empty());
        assert!(members.iter().all(|m| m.closed.lock().unwrap().is_some()));
    }

    #[test]
    fn test_broadcast_snapshot_survives_concurrent_churn() {
        const ROUNDS: usize = 500;

        let pool = SessionPool::<Member>::new();
        let stable: Vec<_> = (0..4).map(|_| Member::new(false)).collect();
        for m in &stable {
            pool.join(Arc::clone(m));
        }

        let counts = std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..ROUNDS {
                    let transient = Member::new(false);
                    pool.join(Arc::clone(&transient));
                    pool.disconnect(&transient, &CloseReason::default());
                }
            });
            let sender = scope.spawn(|| {
                (0..ROUNDS)
                    .map(|_| pool.broadcast(&Frame::from("tick"), &[]))
                    .collect::<Vec<_>>()
            });
            sender.join().unwrap()
        });

        // Each snapshot holds the stable members plus at most one transient.
        assert!(counts.iter().all(|&n| n == 4 || n == 5), "{:?}", counts);
        assert_eq!(pool.len(), 4);
        let ids: Vec<_> = pool.members().iter().map(|m| m.id()).collect();
        assert_eq!(ids, stable.iter().map(|m| m.id).collect::<Vec<_>>());
        for m in &stable {
            assert_eq!(m.received.lock().unwrap().len(), ROUNDS);
            assert!(m.closed.lock().unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_accept_returns_connected_peer() {
        let pool = SessionPool::<Session>::new();
        let mut seen = None;
        let mut peer = pool.accept(|session| seen = Some(session.id()));

        assert_eq!(seen, Some(peer.id()));
        assert_eq!(pool.len(), 1);
        pool.broadcast(&Frame::from("welcome"), &[]);
        assert_eq!(peer.recv().await, Some(Frame::from("welcome")));
    }
}
