//! Path pattern compilation.
//!
//! # Pattern language
//! - `/` separates segments
//! - `:name` captures one segment under `name`
//! - `*` as the last segment captures the rest of the path under `"*"`
//! - the bare pattern `*` matches any path
//!
//! # Design Decisions
//! - Compiled once at registration, never on the request path
//! - Pure: the same input always yields the same tokens or the same error
//! - No other metacharacters, no regex

use std::fmt;
use std::str::FromStr;

use crate::error::PatternError;

/// Parameter key holding a wildcard capture.
pub const WILDCARD_KEY: &str = "*";

/// One token of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern string into its segment tokens.
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        if source == WILDCARD_KEY {
            return Ok(Self {
                source: source.to_string(),
                segments: vec![Segment::Wildcard],
            });
        }

        let Some(rest) = source.strip_prefix('/') else {
            return Err(PatternError::MissingLeadingSlash(source.to_string()));
        };

        let raw: Vec<&str> = rest.split('/').collect();
        let last = raw.len() - 1;
        let mut segments = Vec::with_capacity(raw.len());

        for (i, part) in raw.iter().enumerate() {
            let segment = match *part {
                "" if i == last => return Err(PatternError::TrailingSlash(source.to_string())),
                "" => return Err(PatternError::EmptySegment(source.to_string())),
                "*" if i != last => {
                    return Err(PatternError::MisplacedWildcard(source.to_string()))
                }
                "*" => Segment::Wildcard,
                _ => match part.strip_prefix(':') {
                    Some("") => return Err(PatternError::EmptyParamName(source.to_string())),
                    Some(name) => {
                        if segments.iter().any(|s| matches!(s, Segment::Param(n) if n == name)) {
                            return Err(PatternError::DuplicateParam {
                                pattern: source.to_string(),
                                name: name.to_string(),
                            });
                        }
                        Segment::Param(name.to_string())
                    }
                    None => Segment::Literal(part.to_string()),
                },
            };
            segments.push(segment);
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The pattern string as registered.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True for the bare `*` pattern, which captures the whole path.
    pub fn is_whole_path(&self) -> bool {
        self.source == WILDCARD_KEY
    }

    /// True when the last token is a wildcard.
    pub fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard))
    }

    /// Number of tokens that must line up one-to-one with path segments.
    pub fn fixed_len(&self) -> usize {
        if self.has_wildcard() {
            self.segments.len() - 1
        } else {
            self.segments.len()
        }
    }

    /// Names of the parameters this pattern captures, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Wildcard => Some(WILDCARD_KEY),
            Segment::Literal(_) => None,
        })
    }

    /// Two patterns have the same shape when they accept exactly the same paths.
    /// Parameter names are irrelevant.
    pub fn same_shape(&self, other: &Pattern) -> bool {
        if self.is_whole_path() || other.is_whole_path() {
            return self.is_whole_path() && other.is_whole_path();
        }
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| match (a, b) {
                    (Segment::Literal(x), Segment::Literal(y)) => x == y,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    (Segment::Wildcard, Segment::Wildcard) => true,
                    _ => false,
                })
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
