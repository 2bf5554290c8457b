//! Request body validation.
//!
//! A validator receives the parsed JSON body and either returns the value the
//! handler should see or a `Rejection`, which the router answers with 422.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::http::response;
use crate::http::Response;
use crate::routing::router::panic_message;

/// Why a body was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Human-readable reason; sent as a JSON string.
    Message(String),
    /// Validator-produced error document, sent verbatim.
    Structured(Value),
    /// No detail; the body is the status code.
    Bare,
}

impl Rejection {
    pub fn message(message: impl Into<String>) -> Self {
        Rejection::Message(message.into())
    }

    pub fn into_response(self) -> Response {
        let status = StatusCode::UNPROCESSABLE_ENTITY;
        match self {
            Rejection::Message(message) => response::error(status, &message),
            Rejection::Structured(value) => response::error(status, &value),
            Rejection::Bare => response::error_status(status),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Message(message) => f.write_str(message),
            Rejection::Structured(value) => write!(f, "{}", value),
            Rejection::Bare => f.write_str("rejected"),
        }
    }
}

impl From<serde_json::Error> for Rejection {
    fn from(e: serde_json::Error) -> Self {
        Rejection::Message(e.to_string())
    }
}

type ValidateFn = dyn Fn(Value) -> Result<Value, Rejection> + Send + Sync;

/// A shareable body validator.
#[derive(Clone)]
pub struct Validator {
    inner: Arc<ValidateFn>,
}

impl Validator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, Rejection> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Parse `body` as JSON and run the validator over it.
    /// A body that is not JSON is rejected like any other invalid input,
    /// and so is one that makes the validator panic.
    pub fn run(&self, body: &Bytes) -> Result<Value, Rejection> {
        let value: Value = serde_json::from_slice(body)?;
        match panic::catch_unwind(AssertUnwindSafe(|| (self.inner)(value))) {
            Ok(result) => result,
            Err(panic) => Err(Rejection::Message(panic_message(&*panic))),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator")
    }
}

/// Validator accepting any body that deserializes as `T`.
///
/// The value handed to the handler is `T` serialized back, so defaults and
/// renames applied by serde are visible to it.
pub fn typed<T>() -> Validator
where
    T: DeserializeOwned + Serialize + 'static,
{
    Validator::new(|value| {
        let parsed: T = serde_json::from_value(value)?;
        Ok(serde_json::to_value(parsed)?)
    })
}
