//! Target side of unit RPC: an explicit method table behind one entry point.
//!
//! # Responsibilities
//! - Register externally callable methods by name, before serving
//! - Extract the method name from the first path segment
//! - Decode positional arguments from the POST body or the trailing GET segment
//! - Contain unknown methods, bad arguments and failing methods as error responses
//!
//! # Design Decisions
//! - The registration list is the whole callable surface; nothing is discovered at runtime
//! - Unknown method → 500, undecodable arguments → 400, method failure → 500

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::http::{HeaderMap, Method, StatusCode};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::BoxError;

use crate::error::{TransportError, UnitError};
use crate::http::request::is_websocket_upgrade;
use crate::http::response;
use crate::http::{Request, Response};
use crate::routing::matcher::split_path;
use crate::routing::router::{panic_message, IntoReply};
use crate::rpc::Fetch;

/// What a method sees of the request that invoked it.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub name: String,
    pub method: Method,
    pub headers: HeaderMap,
    upgrade: bool,
}

impl MethodCall {
    /// True when the call arrived as a WebSocket upgrade handshake.
    pub fn is_upgrade(&self) -> bool {
        self.upgrade
    }
}

type BoxedMethod<S> =
    Arc<dyn Fn(S, MethodCall, Value) -> BoxFuture<'static, Result<Response, BoxError>> + Send + Sync>;

/// Collects methods for a `Unit`.
pub struct UnitBuilder<S> {
    state: S,
    methods: HashMap<String, BoxedMethod<S>>,
    issues: Vec<UnitError>,
}

impl<S> UnitBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Register `handler` under `name`.
    ///
    /// `A` is the tuple of positional arguments, e.g. `(String, u32)`; use `()` for none.
    pub fn method<A, H, Fut, R>(mut self, name: &str, handler: H) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        H: Fn(S, MethodCall, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        if name.is_empty() {
            self.issues.push(UnitError::EmptyMethodName);
            return self;
        }
        if name.contains('/') {
            self.issues.push(UnitError::InvalidMethodName(name.to_string()));
            return self;
        }
        if self.methods.contains_key(name) {
            self.issues.push(UnitError::DuplicateMethod(name.to_string()));
            return self;
        }

        let handler = Arc::new(handler);
        let method: BoxedMethod<S> = Arc::new(move |state, call, args| {
            let args = match decode_args::<A>(args) {
                Ok(args) => args,
                Err(e) => {
                    let message = format!("invalid arguments for `{}`: {}", call.name, e);
                    return async move { Ok(response::error(StatusCode::BAD_REQUEST, &message)) }
                        .boxed();
                }
            };
            let fut = handler(state, call, args);
            async move { fut.await.into_reply() }.boxed()
        });
        self.methods.insert(name.to_string(), method);
        self
    }

    pub fn build(self) -> Result<Unit<S>, UnitError> {
        if let Some(first) = self.issues.into_iter().next() {
            return Err(first);
        }
        Ok(Unit {
            state: self.state,
            methods: Arc::new(self.methods),
        })
    }
}

/// Positional arguments decode from an array; `()` also accepts the empty array.
fn decode_args<A: DeserializeOwned>(args: Value) -> Result<A, serde_json::Error> {
    match args {
        Value::Array(items) if items.is_empty() => {
            serde_json::from_value(Value::Array(Vec::new()))
                .or_else(|_| serde_json::from_value(Value::Null))
        }
        Value::Array(items) => serde_json::from_value(Value::Array(items)),
        other => Err(serde::de::Error::custom(format!(
            "expected an argument array, got {}",
            other
        ))),
    }
}

/// An addressable unit exposing registered methods through a single entry point.
pub struct Unit<S> {
    state: S,
    methods: Arc<HashMap<String, BoxedMethod<S>>>,
}

impl<S: Clone> Clone for Unit<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            methods: Arc::clone(&self.methods),
        }
    }
}

impl<S> std::fmt::Debug for Unit<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("Unit").field("methods", &names).finish()
    }
}

impl<S> Unit<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn builder(state: S) -> UnitBuilder<S> {
        UnitBuilder {
            state,
            methods: HashMap::new(),
            issues: Vec::new(),
        }
    }

    /// Names of the callable methods.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// The unit's entry point. Always produces a response.
    pub async fn handle(&self, request: Request) -> Response {
        let upgrade = is_websocket_upgrade(&request);
        let (parts, body) = request.into_parts();
        let segments = split_path(parts.uri.path());
        let name = segments.first().copied().unwrap_or_default().to_string();

        let Some(method) = self.methods.get(&name) else {
            tracing::warn!(method = %name, "Call to unknown unit method");
            return response::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("unknown method `{}`", name),
            );
        };

        let args = if parts.method == Method::GET {
            match segments.get(1) {
                Some(raw) => percent_decode_str(raw)
                    .decode_utf8()
                    .map_err(|e| e.to_string())
                    .and_then(|decoded| serde_json::from_str(&decoded).map_err(|e| e.to_string())),
                None => Ok(Value::Array(Vec::new())),
            }
        } else if body.is_empty() {
            Ok(Value::Array(Vec::new()))
        } else {
            serde_json::from_slice(&body).map_err(|e| e.to_string())
        };

        let args = match args {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!(method = %name, error = %e, "Unreadable unit call arguments");
                return response::error(
                    StatusCode::BAD_REQUEST,
                    &format!("invalid arguments for `{}`: {}", name, e),
                );
            }
        };

        let call = MethodCall {
            name: name.clone(),
            method: parts.method,
            headers: parts.headers,
            upgrade,
        };

        let state = self.state.clone();
        match AssertUnwindSafe(async move { method(state, call, args).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(method = %name, error = %e, "Unit method failed");
                response::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(method = %name, panic = %message, "Unit method panicked");
                response::error(StatusCode::INTERNAL_SERVER_ERROR, &message)
            }
        }
    }
}

impl<S> Fetch for Unit<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        async move { Ok(self.handle(request).await) }.boxed()
    }
}
