//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → server stops accepting → in-flight requests drain → sessions closed → exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close sessions
//! - One broadcast channel; every long-running task subscribes

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
