//! Route matching logic.
//!
//! # Responsibilities
//! - Match the request method against a route verb (case-insensitive)
//! - Match request path segments against a compiled pattern
//! - Capture named parameters and the wildcard remainder
//!
//! # Design Decisions
//! - `ALL` matches every method
//! - Literal segments are case-sensitive
//! - A mismatch rejects only the route being tried, never the dispatch

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::routing::pattern::{Pattern, Segment, WILDCARD_KEY};

/// Captured path parameters, keyed by name (`"*"` for the wildcard).
pub type Params = HashMap<String, String>;

/// HTTP verb a route answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    /// Matches any method.
    All,
}

impl Verb {
    /// Every concrete verb, in the order they are usually listed.
    pub const METHODS: [Verb; 7] = [
        Verb::Get,
        Verb::Post,
        Verb::Put,
        Verb::Delete,
        Verb::Patch,
        Verb::Head,
        Verb::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Patch => "PATCH",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
            Verb::All => "ALL",
        }
    }

    /// The HTTP method this verb sends, or `None` for `ALL`.
    pub fn method(&self) -> Option<Method> {
        match self {
            Verb::Get => Some(Method::GET),
            Verb::Post => Some(Method::POST),
            Verb::Put => Some(Method::PUT),
            Verb::Delete => Some(Method::DELETE),
            Verb::Patch => Some(Method::PATCH),
            Verb::Head => Some(Method::HEAD),
            Verb::Options => Some(Method::OPTIONS),
            Verb::All => None,
        }
    }

    /// Returns true if a request with `method` is handled by this verb.
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            Verb::All => true,
            verb => verb.as_str().eq_ignore_ascii_case(method.as_str()),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised verb name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verb `{0}`")]
pub struct UnknownVerb(pub String);

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::METHODS
            .iter()
            .chain(std::iter::once(&Verb::All))
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| UnknownVerb(s.to_string()))
    }
}

/// Split a request path into segments, using the same `/` convention as patterns.
///
/// The leading slash is dropped, so `/` yields a single empty segment and
/// `/foo/` yields `["foo", ""]`.
pub fn split_path(path: &str) -> Vec<&str> {
    path.strip_prefix('/').unwrap_or(path).split('/').collect()
}

/// Match path segments against a pattern, verb aside.
///
/// Returns the captured parameters, or `None` when the path does not fit.
pub fn match_segments(segments: &[&str], pattern: &Pattern) -> Option<Params> {
    if pattern.is_whole_path() {
        let mut params = Params::with_capacity(1);
        params.insert(WILDCARD_KEY.to_string(), format!("/{}", segments.join("/")));
        return Some(params);
    }

    if pattern.has_wildcard() {
        if segments.len() < pattern.fixed_len() {
            return None;
        }
    } else if segments.len() != pattern.segments().len() {
        return None;
    }

    let mut params = Params::new();
    for (i, token) in pattern.segments().iter().enumerate() {
        match token {
            Segment::Wildcard => {
                params.insert(WILDCARD_KEY.to_string(), segments[i..].join("/"));
                return Some(params);
            }
            Segment::Param(name) => {
                params.insert(name.clone(), segments[i].to_string());
            }
            Segment::Literal(text) => {
                if segments[i] != text.as_str() {
                    return None;
                }
            }
        }
    }

    Some(params)
}
