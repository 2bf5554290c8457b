//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, body buffering, upgrade routes)
//!     → request.rs (collect body into Request)
//!     → [entry point: Router or Unit]
//!     → response.rs (encoded/raw constructors, status-class Outcome)
//!     → Send to client
//!
//! Upgrade path:
//!     server.rs → SessionPool::accept → websocket.rs (bridge frames)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

use axum::body::Bytes;

/// Buffered request as seen by routes and units.
pub type Request = axum::http::Request<Bytes>;

/// Buffered response produced by routes and units.
pub type Response = axum::http::Response<Bytes>;

pub use request::is_websocket_upgrade;
pub use response::{Outcome, TypedResponse};
pub use server::HttpServer;
