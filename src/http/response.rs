//! Response construction and status-class classification.
//!
//! # Responsibilities
//! - Build encoded (JSON) and raw responses
//! - Classify a response as success (2xx) or failure (anything else)
//! - Decode the body into the success or error type accordingly
//!
//! # Wire contract
//! - Encoded success: JSON value, `null` when there is nothing to say
//! - Encoded failure: JSON value, or the numeric status when none is given
//! - Raw: body passed through untouched, no content-type forced
//!
//! # Design Decisions
//! - Only "2xx" vs "not 2xx" matters; 1xx/3xx count as failures
//! - Serialization failure degrades to a 500 instead of panicking

use std::fmt;
use std::marker::PhantomData;

use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;
use crate::http::Response;

pub const APPLICATION_JSON: &str = "application/json";

/// Encoded success response. `status` must be 2xx.
pub fn ok<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
    debug_assert!(status.is_success(), "ok() with non-2xx status {}", status);
    encoded(status, value)
}

/// Encoded success response with a `null` body.
pub fn ok_empty(status: StatusCode) -> Response {
    debug_assert!(status.is_success(), "ok_empty() with non-2xx status {}", status);
    encoded(status, &serde_json::Value::Null)
}

/// Encoded failure response carrying `value`. `status` must not be 2xx.
pub fn error<E: Serialize + ?Sized>(status: StatusCode, value: &E) -> Response {
    debug_assert!(!status.is_success(), "error() with 2xx status {}", status);
    encoded(status, value)
}

/// Encoded failure response whose body is the status code itself.
pub fn error_status(status: StatusCode) -> Response {
    debug_assert!(!status.is_success(), "error_status() with 2xx status {}", status);
    encoded(status, &status.as_u16())
}

/// Raw response: the body is sent as-is.
pub fn body(status: StatusCode, body: impl Into<Bytes>) -> Response {
    build(status, None, body.into())
}

fn encoded<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(bytes) => build(status, Some(APPLICATION_JSON), bytes.into()),
        Err(e) => {
            tracing::error!(status = %status, error = %e, "Failed to encode response body");
            let message = serde_json::Value::String(e.to_string()).to_string();
            build(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(APPLICATION_JSON),
                message.into(),
            )
        }
    }
}

fn build(status: StatusCode, content_type: Option<&'static str>, body: Bytes) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    if let Some(ct) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
    }
    response
}

/// A response classified by its status class.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T, E> {
    Success { value: T },
    Failure { value: E, status: StatusCode },
}

impl<T, E> Outcome<T, E> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Status of a failure; successes carry no status.
    pub fn failure_status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { status, .. } => Some(*status),
        }
    }

    pub fn into_result(self) -> Result<T, (StatusCode, E)> {
        match self {
            Outcome::Success { value } => Ok(value),
            Outcome::Failure { value, status } => Err((status, value)),
        }
    }

    pub fn success(self) -> Option<T> {
        self.into_result().ok()
    }
}

impl<T: DeserializeOwned, E: DeserializeOwned> Outcome<T, E> {
    /// Decode an encoded response.
    pub fn decode(response: &Response) -> Result<Self, CodecError> {
        let status = response.status();
        let body = response.body();
        if status.is_success() {
            serde_json::from_slice(body)
                .map(|value| Outcome::Success { value })
                .map_err(|source| CodecError {
                    status,
                    class: "success",
                    source,
                })
        } else {
            serde_json::from_slice(body)
                .map(|value| Outcome::Failure { value, status })
                .map_err(|source| CodecError {
                    status,
                    class: "failure",
                    source,
                })
        }
    }
}

impl Outcome<Bytes, Bytes> {
    /// Classify a raw response without decoding its body.
    pub fn raw(response: &Response) -> Self {
        let value = response.body().clone();
        let status = response.status();
        if status.is_success() {
            Outcome::Success { value }
        } else {
            Outcome::Failure { value, status }
        }
    }
}

/// A response tagged with the success and error types its body decodes to.
pub struct TypedResponse<T, E> {
    inner: Response,
    _types: PhantomData<fn() -> (T, E)>,
}

impl<T, E> TypedResponse<T, E> {
    pub fn new(inner: Response) -> Self {
        Self {
            inner,
            _types: PhantomData,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// True when the status is 2xx.
    pub fn is_ok(&self) -> bool {
        self.inner.status().is_success()
    }

    /// Classify without decoding; for raw-bodied responses.
    pub fn bytes(&self) -> Outcome<Bytes, Bytes> {
        Outcome::raw(&self.inner)
    }

    pub fn into_inner(self) -> Response {
        self.inner
    }
}

impl<T: DeserializeOwned, E: DeserializeOwned> TypedResponse<T, E> {
    pub fn json(&self) -> Result<Outcome<T, E>, CodecError> {
        Outcome::decode(&self.inner)
    }
}

impl<T, E> fmt::Debug for TypedResponse<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedResponse")
            .field("status", &self.inner.status())
            .field("body_len", &self.inner.body().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_ok_is_success() {
        let response = ok(StatusCode::OK, "foobar");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static(APPLICATION_JSON)
        );
        let outcome = Outcome::<String, Value>::decode(&response).unwrap();
        assert!(outcome.is_ok());
        assert_eq!(outcome.success().as_deref(), Some("foobar"));
    }

    #[test]
    fn test_error_is_failure() {
        let response = error(StatusCode::UNAUTHORIZED, "foobar");
        let outcome = Outcome::<Value, String>::decode(&response).unwrap();
        assert!(!outcome.is_ok());
        assert_eq!(
            outcome,
            Outcome::Failure {
                value: "foobar".to_string(),
                status: StatusCode::UNAUTHORIZED,
            }
        );
    }

    #[test]
    fn test_empty_payloads() {
        assert_eq!(ok_empty(StatusCode::CREATED).body().as_ref(), b"null");
        assert_eq!(error_status(StatusCode::NOT_FOUND).body().as_ref(), b"404");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "non-2xx")]
    fn test_ok_rejects_failure_status() {
        let _ = ok(StatusCode::NOT_FOUND, "foobar");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "2xx status")]
    fn test_error_rejects_success_status() {
        let _ = error(StatusCode::OK, "foobar");
    }

    #[test]
    fn test_redirects_are_failures() {
        let response = error_status(StatusCode::FOUND);
        let outcome = Outcome::<Value, u16>::decode(&response).unwrap();
        assert_eq!(outcome.failure_status(), Some(StatusCode::FOUND));
        assert_eq!(outcome.into_result(), Err((StatusCode::FOUND, 302)));
    }

    #[test]
    fn test_raw_body_is_not_encoded() {
        let response = body(StatusCode::UNAUTHORIZED, "foobar");
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        let typed = TypedResponse::<Value, Value>::new(response);
        assert!(!typed.is_ok());
        match typed.bytes() {
            Outcome::Failure { value, status } => {
                assert_eq!(value.as_ref(), b"foobar");
                assert_eq!(status, StatusCode::UNAUTHORIZED);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_mismatch_reports_class() {
        let response = ok(StatusCode::OK, "text");
        let err = Outcome::<u32, Value>::decode(&response).unwrap_err();
        assert_eq!(err.class, "success");
        assert_eq!(err.status, StatusCode::OK);
    }
}
