//! Error taxonomy.
//!
//! # Responsibilities
//! - Build-time errors (pattern compilation, route table, unit method table)
//! - Call-time errors (transport, argument encoding, body decoding)
//!
//! # Design Decisions
//! - Build-time errors are fatal: the host refuses to start
//! - No-match, validation and handler failures are never errors here; the
//!   router turns them into well-formed responses
//! - Transport failures surface as values, never as panics

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

use crate::routing::Verb;

/// A malformed path pattern, naming the rule it breaks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern `{0}` must be `*` or start with `/`")]
    MissingLeadingSlash(String),

    #[error("pattern `{0}` contains an empty segment")]
    EmptySegment(String),

    #[error("pattern `{0}` cannot end with a slash")]
    TrailingSlash(String),

    #[error("pattern `{0}` has `*` before its last segment")]
    MisplacedWildcard(String),

    #[error("pattern `{0}` has a parameter with no name")]
    EmptyParamName(String),

    #[error("pattern `{pattern}` captures `:{name}` twice")]
    DuplicateParam { pattern: String, name: String },
}

/// One problem found while building a route table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteIssue {
    #[error("{verb} route: {source}")]
    Pattern {
        verb: Verb,
        #[source]
        source: PatternError,
    },

    #[error("{verb} {pattern} overlaps route #{earlier} ({verb} {earlier_pattern})")]
    Overlapping {
        verb: Verb,
        pattern: String,
        earlier: usize,
        earlier_pattern: String,
    },
}

/// Route table rejected at build time. Carries every issue, not just the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTableError {
    pub issues: Vec<RouteIssue>,
}

impl fmt::Display for RouteTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid route table: ")?;
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for RouteTableError {}

/// Unit method table rejected at build time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("method name cannot be empty")]
    EmptyMethodName,

    #[error("method name `{0}` cannot contain `/`")]
    InvalidMethodName(String),

    #[error("method `{0}` registered twice")]
    DuplicateMethod(String),
}

/// The outbound hop to an addressable unit failed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to remote unit failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid origin `{origin}`: {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unit unavailable: {0}")]
    Unavailable(String),
}

/// A response body that does not decode as the expected type.
#[derive(Debug, Error)]
#[error("failed to decode {class} body (status {status}): {source}")]
pub struct CodecError {
    pub status: StatusCode,
    pub class: &'static str,
    #[source]
    pub source: serde_json::Error,
}

/// Caller-side RPC failure.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to encode arguments for `{method}`: {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request uri for `{method}`: {reason}")]
    InvalidUri { method: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] CodecError),
}

/// Typed route client failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no {verb} route registered for `{pattern}`")]
    UnknownRoute { verb: Verb, pattern: String },

    #[error("missing parameter :{0}")]
    MissingParam(String),

    #[error("invalid request for `{path}`: {reason}")]
    InvalidRequest { path: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] CodecError),
}

/// A session refused a frame because its peer is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} is closed")]
    Closed(uuid::Uuid),
}
