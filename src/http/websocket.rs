//! WebSocket session bridging.
//!
//! # Responsibilities
//! - Pump frames from a session's peer half onto the socket
//! - Pump socket messages back to the unit
//! - Propagate close in both directions
//!
//! # Data Flow
//! ```text
//! Client ←── WebSocket messages ──→ bridge ←── Frame channel ──→ Session (in SessionPool)
//! ```
//!
//! # Design Decisions
//! - Frame-level forwarding (no message buffering)
//! - Ping/pong handled by axum, never surfaced to the unit
//! - When the socket ends the peer half is dropped, so the next send to the session fails

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use crate::sessions::{Frame, Peer};

/// Run the bridge until either side closes.
pub async fn bridge(socket: WebSocket, peer: Peer) {
    let id = peer.id();
    let (mut from_unit, to_unit) = peer.into_parts();
    let (mut sink, mut stream) = socket.split();

    tracing::debug!(session = %id, "WebSocket bridge started");

    loop {
        tokio::select! {
            frame = from_unit.recv() => match frame {
                Some(frame) => {
                    let closing = matches!(frame, Frame::Close { .. });
                    if let Err(e) = sink.send(to_message(frame)).await {
                        tracing::debug!(session = %id, error = %e, "Socket send failed");
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            message = stream.next() => match message {
                Some(Ok(message)) => {
                    let Some(frame) = from_message(message) else {
                        continue;
                    };
                    let closing = matches!(frame, Frame::Close { .. });
                    if to_unit.send(frame).is_err() || closing {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!(session = %id, error = %e, "Socket receive failed");
                    let _ = to_unit.send(Frame::Close { code: None, reason: None });
                    break;
                }
                None => {
                    let _ = to_unit.send(Frame::Close { code: None, reason: None });
                    break;
                }
            },
        }
    }

    tracing::debug!(session = %id, "WebSocket bridge finished");
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes),
        Frame::Close { code, reason } => Message::Close(code.map(|code| CloseFrame {
            code,
            reason: reason.unwrap_or_default().into(),
        })),
    }
}

fn from_message(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.as_str().to_string())),
        Message::Binary(bytes) => Some(Frame::Binary(bytes)),
        Message::Close(close) => Some(match close {
            Some(close) => Frame::Close {
                code: Some(close.code),
                reason: Some(close.reason.as_str().to_string()),
            },
            None => Frame::Close {
                code: None,
                reason: None,
            },
        }),
        Message::Ping(_) | Message::Pong(_) => None,
    }
}
