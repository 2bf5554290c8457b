//! Duplex sessions.
//!
//! A `Session` is the unit-side half of a connection pair; the `Peer` is
//! the half handed to whoever completes the upgrade (normally the
//! WebSocket bridge). Each direction is an unbounded tokio channel.

use std::sync::{Mutex, PoisonError};

use axum::body::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::SessionError;

pub type SessionId = Uuid;

/// One message travelling over a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Close {
        code: Option<u16>,
        reason: Option<String>,
    },
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Frame::Text(text.to_string())
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Frame::Text(text)
    }
}

/// The only surface a `SessionPool` needs from a connection.
pub trait Connection: Send + Sync + 'static {
    fn id(&self) -> SessionId;

    /// Deliver a frame. An error means the connection is gone.
    fn send(&self, frame: &Frame) -> Result<(), SessionError>;

    /// Close the connection. Closing twice is harmless.
    fn close(&self, code: Option<u16>, reason: Option<&str>);
}

/// Channel-backed session owned by a pool.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    outgoing: mpsc::UnboundedSender<Frame>,
    incoming: Mutex<Option<mpsc::UnboundedReceiver<Frame>>>,
}

impl Session {
    /// Create a connected `(Session, Peer)` pair.
    pub fn pair() -> (Session, Peer) {
        let id = Uuid::new_v4();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let session = Session {
            id,
            outgoing: out_tx,
            incoming: Mutex::new(Some(in_rx)),
        };
        let peer = Peer {
            id,
            outgoing: out_rx,
            incoming: in_tx,
        };
        (session, peer)
    }

    /// Take the stream of frames sent by the peer. Only the first call gets it.
    pub fn take_incoming(&self) -> Option<mpsc::UnboundedReceiver<Frame>> {
        self.incoming
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_closed(&self) -> bool {
        self.outgoing.is_closed()
    }
}

impl Connection for Session {
    fn id(&self) -> SessionId {
        self.id
    }

    fn send(&self, frame: &Frame) -> Result<(), SessionError> {
        self.outgoing
            .send(frame.clone())
            .map_err(|_| SessionError::Closed(self.id))
    }

    fn close(&self, code: Option<u16>, reason: Option<&str>) {
        let _ = self.outgoing.send(Frame::Close {
            code,
            reason: reason.map(str::to_string),
        });
    }
}

/// The far half of a session.
#[derive(Debug)]
pub struct Peer {
    id: SessionId,
    outgoing: mpsc::UnboundedReceiver<Frame>,
    incoming: mpsc::UnboundedSender<Frame>,
}

impl Peer {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Next frame sent by the unit; `None` once the session is dropped.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.outgoing.recv().await
    }

    /// Send a frame to the unit.
    pub fn send(&self, frame: Frame) -> Result<(), SessionError> {
        self.incoming
            .send(frame)
            .map_err(|_| SessionError::Closed(self.id))
    }

    /// Split into (frames from the unit, sender towards the unit).
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<Frame>,
        mpsc::UnboundedSender<Frame>,
    ) {
        (self.outgoing, self.incoming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_is_connected_both_ways() {
        let (session, mut peer) = Session::pair();
        assert_eq!(session.id(), peer.id());

        session.send(&Frame::from("hello")).unwrap();
        assert_eq!(peer.recv().await, Some(Frame::Text("hello".into())));

        let mut incoming = session.take_incoming().unwrap();
        assert!(session.take_incoming().is_none());
        peer.send(Frame::from("hi back")).unwrap();
        assert_eq!(incoming.recv().await, Some(Frame::Text("hi back".into())));
    }

    #[test]
    fn test_send_after_peer_dropped_fails() {
        let (session, peer) = Session::pair();
        drop(peer);
        assert!(session.is_closed());
        assert_eq!(
            session.send(&Frame::from("x")),
            Err(SessionError::Closed(session.id()))
        );
    }

    #[tokio::test]
    async fn test_close_sends_close_frame() {
        let (session, mut peer) = Session::pair();
        session.close(Some(1000), Some("bye"));
        assert_eq!(
            peer.recv().await,
            Some(Frame::Close {
                code: Some(1000),
                reason: Some("bye".into())
            })
        );
    }
}
