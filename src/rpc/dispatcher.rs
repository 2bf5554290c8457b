//! Caller side of unit RPC.
//!
//! # Wire convention
//! ```text
//! POST /<method>                          body: JSON array of arguments
//! GET  /<method>/<percent-encoded array>  no body (upgrade handshakes)
//! ```
//!
//! # Design Decisions
//! - The response comes back verbatim; only `Outcome` interprets the status
//! - One attempt per call, no retry
//! - Arguments are a tuple; a lone non-array value is sent as the only argument

use std::time::Instant;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::RpcError;
use crate::http::response::{Outcome, TypedResponse, APPLICATION_JSON};
use crate::http::{Request, Response};
use crate::observability::metrics;
use crate::rpc::Fetch;

/// Origin used for synthetic request URLs when the caller does not supply one.
pub const DEFAULT_ORIGIN: &str = "http://unit.internal";

/// Characters escaped in the GET argument segment (everything `encodeURIComponent` escapes).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Client for invoking named methods on one addressable unit.
#[derive(Debug, Clone)]
pub struct RpcClient<F> {
    stub: F,
    origin: String,
    headers: HeaderMap,
}

impl<F: Fetch> RpcClient<F> {
    pub fn new(stub: F) -> Self {
        Self {
            stub,
            origin: DEFAULT_ORIGIN.to_string(),
            headers: HeaderMap::new(),
        }
    }

    /// Address synthetic requests to `origin`. Only scheme, host and port are kept.
    pub fn with_origin(mut self, origin: &str) -> Result<Self, url::ParseError> {
        self.origin = Url::parse(origin)?.origin().ascii_serialization();
        Ok(self)
    }

    /// Forward the headers of an inbound request on every call.
    ///
    /// `content-length` is dropped since each call carries its own body.
    pub fn forwarding<B>(mut self, inbound: &axum::http::Request<B>) -> Self {
        let mut headers = inbound.headers().clone();
        headers.remove(header::CONTENT_LENGTH);
        self.headers = headers;
        self
    }

    pub fn stub(&self) -> &F {
        &self.stub
    }

    /// POST `args` to `/<method>` and return the unit's response untouched.
    pub async fn call_raw<A>(&self, method: &str, args: &A) -> Result<Response, RpcError>
    where
        A: Serialize + ?Sized,
    {
        let body = encode_args(method, args)?;
        let request = self.request(method, Method::POST, &format!("/{}", method), Bytes::from(body))?;
        self.send(method, request).await
    }

    /// GET `/<method>/<encoded args>`, for transports that only allow GET.
    pub async fn call_get_raw<A>(&self, method: &str, args: &A) -> Result<Response, RpcError>
    where
        A: Serialize + ?Sized,
    {
        let encoded = encode_args(method, args)?;
        let segment = utf8_percent_encode(&encoded, COMPONENT).to_string();
        let request = self.request(
            method,
            Method::GET,
            &format!("/{}/{}", method, segment),
            Bytes::new(),
        )?;
        self.send(method, request).await
    }

    /// Call `method`, tagging the response with its success and error types.
    pub async fn call<T, E, A>(&self, method: &str, args: &A) -> Result<TypedResponse<T, E>, RpcError>
    where
        A: Serialize + ?Sized,
    {
        self.call_raw(method, args).await.map(TypedResponse::new)
    }

    /// Call `method` and decode the result according to its status class.
    pub async fn invoke<T, E, A>(&self, method: &str, args: &A) -> Result<Outcome<T, E>, RpcError>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        let response = self.call_raw(method, args).await?;
        Ok(Outcome::decode(&response)?)
    }

    fn request(&self, name: &str, method: Method, path: &str, body: Bytes) -> Result<Request, RpcError> {
        let mut request = axum::http::Request::builder()
            .method(method)
            .uri(format!("{}{}", self.origin, path))
            .body(body)
            .map_err(|e| RpcError::InvalidUri {
                method: name.to_string(),
                reason: e.to_string(),
            })?;
        let headers = request.headers_mut();
        headers.extend(self.headers.clone());
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        Ok(request)
    }

    async fn send(&self, method: &str, request: Request) -> Result<Response, RpcError> {
        let start = Instant::now();
        match self.stub.fetch(request).await {
            Ok(response) => {
                let outcome = if response.status().is_success() {
                    "success"
                } else {
                    "failure"
                };
                tracing::debug!(method = %method, status = %response.status(), "Unit call completed");
                metrics::record_rpc(method, outcome, start);
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(method = %method, error = %e, "Unit call failed in transport");
                metrics::record_rpc(method, "transport_error", start);
                Err(e.into())
            }
        }
    }
}

fn encode_args<A: Serialize + ?Sized>(method: &str, args: &A) -> Result<String, RpcError> {
    let encode_err = |source| RpcError::Encode {
        method: method.to_string(),
        source,
    };
    let value = serde_json::to_value(args).map_err(encode_err)?;
    let array = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        single => vec![single],
    };
    serde_json::to_string(&array).map_err(encode_err)
}
