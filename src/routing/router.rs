//! Route table and dispatch.
//!
//! # Responsibilities
//! - Build the route table once, before serving, rejecting bad patterns and overlaps
//! - Walk routes in registration order and pick the first verb + path match
//! - Run the route's validator, then its handler
//! - Turn no-match, rejection and handler failure into responses
//!
//! # Design Decisions
//! - Immutable after `build()` (shared without locks)
//! - First match wins; a failing handler ends the dispatch with 500
//! - Exhausting the table yields 404

use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::BoxError;

use crate::error::{RouteIssue, RouteTableError, TransportError};
use crate::http::response;
use crate::http::{Request, Response};
use crate::observability::metrics;
use crate::routing::matcher::{match_segments, split_path, Params, Verb};
use crate::routing::pattern::{Pattern, WILDCARD_KEY};
use crate::routing::validator::Validator;
use crate::rpc::Fetch;

/// Everything a handler receives about the matched request.
#[derive(Debug)]
pub struct RouteContext {
    pub request: Request,
    pub params: Params,
    /// Validated body; present only when the route has a validator.
    pub value: Option<Value>,
}

impl RouteContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The wildcard capture, if the pattern has one.
    pub fn wildcard(&self) -> Option<&str> {
        self.param(WILDCARD_KEY)
    }

    /// Deserialize the validated body.
    pub fn value_as<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.value.clone().map(serde_json::from_value)
    }
}

/// Conversion from a handler's return value into a response or a handler error.
pub trait IntoReply {
    fn into_reply(self) -> Result<Response, BoxError>;
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Response, BoxError> {
        Ok(self)
    }
}

impl<E> IntoReply for Result<Response, E>
where
    E: Into<BoxError>,
{
    fn into_reply(self) -> Result<Response, BoxError> {
        self.map_err(Into::into)
    }
}

type BoxedHandler<S> =
    Arc<dyn Fn(RouteContext, S) -> BoxFuture<'static, Result<Response, BoxError>> + Send + Sync>;

struct Route<S> {
    /// Zero-based registration call, counting rejected registrations too.
    index: usize,
    verb: Verb,
    pattern: Pattern,
    handler: BoxedHandler<S>,
    validator: Option<Validator>,
}

/// Collects routes, then freezes them into a `Router`.
pub struct RouteTableBuilder<S> {
    routes: Vec<Route<S>>,
    issues: Vec<RouteIssue>,
    registered: usize,
}

impl<S> RouteTableBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            routes: Vec::new(),
            issues: Vec::new(),
            registered: 0,
        }
    }

    /// Register `handler` for `verb` requests matching `pattern`.
    pub fn route<H, Fut, R>(self, verb: Verb, pattern: &str, handler: H) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.push(verb, pattern, boxed(handler), None)
    }

    /// Register a route whose JSON body must pass `validator` first.
    pub fn validated<H, Fut, R>(
        self,
        verb: Verb,
        pattern: &str,
        validator: Validator,
        handler: H,
    ) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.push(verb, pattern, boxed(handler), Some(validator))
    }

    pub fn get<H, Fut, R>(self, pattern: &str, handler: H) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.route(Verb::Get, pattern, handler)
    }

    pub fn post<H, Fut, R>(self, pattern: &str, handler: H) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.route(Verb::Post, pattern, handler)
    }

    pub fn put<H, Fut, R>(self, pattern: &str, handler: H) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.route(Verb::Put, pattern, handler)
    }

    pub fn delete<H, Fut, R>(self, pattern: &str, handler: H) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.route(Verb::Delete, pattern, handler)
    }

    pub fn patch<H, Fut, R>(self, pattern: &str, handler: H) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.route(Verb::Patch, pattern, handler)
    }

    pub fn head<H, Fut, R>(self, pattern: &str, handler: H) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.route(Verb::Head, pattern, handler)
    }

    pub fn options<H, Fut, R>(self, pattern: &str, handler: H) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.route(Verb::Options, pattern, handler)
    }

    pub fn all<H, Fut, R>(self, pattern: &str, handler: H) -> Self
    where
        H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        self.route(Verb::All, pattern, handler)
    }

    fn push(
        mut self,
        verb: Verb,
        pattern: &str,
        handler: BoxedHandler<S>,
        validator: Option<Validator>,
    ) -> Self {
        let index = self.registered;
        self.registered += 1;

        let pattern = match Pattern::compile(pattern) {
            Ok(p) => p,
            Err(source) => {
                self.issues.push(RouteIssue::Pattern { verb, source });
                return self;
            }
        };

        if let Some(route) = self
            .routes
            .iter()
            .find(|r| r.verb == verb && r.pattern.same_shape(&pattern))
        {
            self.issues.push(RouteIssue::Overlapping {
                verb,
                pattern: pattern.source().to_string(),
                earlier: route.index,
                earlier_pattern: route.pattern.source().to_string(),
            });
            return self;
        }

        self.routes.push(Route {
            index,
            verb,
            pattern,
            handler,
            validator,
        });
        self
    }

    /// Freeze the table. Fails with every issue found during registration.
    pub fn build(self) -> Result<Router<S>, RouteTableError> {
        if !self.issues.is_empty() {
            return Err(RouteTableError {
                issues: self.issues,
            });
        }
        tracing::debug!(routes = self.routes.len(), "Route table built");
        Ok(Router {
            routes: self.routes.into(),
        })
    }
}

fn boxed<S, H, Fut, R>(handler: H) -> BoxedHandler<S>
where
    H: Fn(RouteContext, S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoReply,
{
    Arc::new(move |ctx, state| {
        let fut = handler(ctx, state);
        async move { fut.await.into_reply() }.boxed()
    })
}

/// Immutable, ordered route table with dispatch.
///
/// `S` is whatever context the host threads through to handlers.
pub struct Router<S = ()> {
    routes: Arc<[Route<S>]>,
}

impl<S> Clone for Router<S> {
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
        }
    }
}

impl<S> std::fmt::Debug for Router<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| format!("{} {}", r.verb, r.pattern)))
            .finish()
    }
}

impl<S> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn builder() -> RouteTableBuilder<S> {
        RouteTableBuilder::new()
    }

    /// Registered `(verb, pattern)` pairs in precedence order.
    pub fn routes(&self) -> impl Iterator<Item = (Verb, &Pattern)> {
        self.routes.iter().map(|r| (r.verb, &r.pattern))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch one request. Always produces a response.
    pub async fn dispatch(&self, request: Request, state: S) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let matched = {
            let segments = split_path(&path);
            self.routes.iter().find_map(|route| {
                if !route.verb.matches(&method) {
                    return None;
                }
                match_segments(&segments, &route.pattern).map(|params| (route, params))
            })
        };

        let Some((route, params)) = matched else {
            tracing::warn!(method = %method, path = %path, "No route matched");
            metrics::record_dispatch(method.as_str(), 404, "none", start);
            return response::error_status(StatusCode::NOT_FOUND);
        };

        let pattern = route.pattern.source();
        tracing::debug!(method = %method, path = %path, pattern = %pattern, "Dispatching request");

        let value = match &route.validator {
            Some(validator) => match validator.run(request.body()) {
                Ok(value) => Some(value),
                Err(rejection) => {
                    tracing::warn!(path = %path, pattern = %pattern, reason = %rejection, "Request body rejected");
                    metrics::record_dispatch(method.as_str(), 422, pattern, start);
                    return rejection.into_response();
                }
            },
            None => None,
        };

        let ctx = RouteContext {
            request,
            params,
            value,
        };

        // The handler is called inside the guard so a panic before its
        // future exists is caught too.
        let handler = &route.handler;
        let response = match AssertUnwindSafe(async move { handler(ctx, state).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(path = %path, pattern = %pattern, error = %e, "Handler failed");
                response::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(path = %path, pattern = %pattern, panic = %message, "Handler panicked");
                response::error(StatusCode::INTERNAL_SERVER_ERROR, &message)
            }
        };

        metrics::record_dispatch(method.as_str(), response.status().as_u16(), pattern, start);
        response
    }

    /// Bind the router to its context, producing a request entry point.
    pub fn with_state(self, state: S) -> RouterService<S> {
        RouterService {
            router: self,
            state,
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// A router bound to its context: the entry point of an addressable unit.
#[derive(Clone, Debug)]
pub struct RouterService<S> {
    router: Router<S>,
    state: S,
}

impl<S> RouterService<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub async fn handle(&self, request: Request) -> Response {
        self.router.dispatch(request, self.state.clone()).await
    }

    pub fn router(&self) -> &Router<S> {
        &self.router
    }
}

impl<S> Fetch for RouterService<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        async move { Ok(self.handle(request).await) }.boxed()
    }
}

impl<S> tower::Service<Request> for RouterService<S>
where
    S: Clone + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let this = self.clone();
        async move { Ok(this.handle(request).await) }.boxed()
    }
}
