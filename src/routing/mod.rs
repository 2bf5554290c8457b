//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     (verb, pattern, handler[, validator])*
//!     → pattern.rs (compile to segment tokens)
//!     → router.rs (collect issues, detect overlaps)
//!     → Freeze as immutable Router
//!
//! Incoming Request (method, path, body)
//!     → router.rs (walk routes in registration order)
//!     → matcher.rs (verb check, segment match, parameter capture)
//!     → validator.rs (optional body check)
//!     → handler → Response
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod fetcher;
pub mod matcher;
pub mod pattern;
pub mod router;
pub mod validator;

pub use fetcher::{Fetcher, RouteAccessor};
pub use matcher::{Params, Verb};
pub use pattern::{Pattern, Segment, WILDCARD_KEY};
pub use router::{IntoReply, RouteContext, RouteTableBuilder, Router, RouterService};
pub use validator::{Rejection, Validator};
