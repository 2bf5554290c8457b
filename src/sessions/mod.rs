//! Duplex session tracking.
//!
//! # Data Flow
//! ```text
//! Upgrade request
//!     → pool.rs (accept: new Session joins membership, setup runs)
//!     → Peer → http/websocket.rs (bridged to the socket)
//!
//! Unit code
//!     → pool.rs (broadcast / disconnect / close_all)
//!     → session.rs (Connection::send / close)
//! ```

pub mod pool;
pub mod session;

pub use pool::{CloseReason, SessionPool};
pub use session::{Connection, Frame, Peer, Session, SessionId};
