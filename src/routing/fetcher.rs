//! Typed client for a router's own table.
//!
//! A `Fetcher` is generated from a built `Router`: one accessor per
//! concrete-verb route, addressed by the same pattern text the route was
//! registered with. Calling through an accessor fills the pattern's
//! parameters and sends the request to the unit via any `Fetch` stub.
//!
//! # Design Decisions
//! - Accessors are generated once, when the fetcher is built
//! - `ALL` routes and the whole-path `*` route have no accessor; use `fetch`
//! - Parameter values are inserted as given, without escaping

use std::collections::HashMap;

use axum::body::Bytes;
use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::FetchError;
use crate::http::response::{Outcome, APPLICATION_JSON};
use crate::http::{Request, Response};
use crate::routing::matcher::{Params, Verb};
use crate::routing::pattern::{Pattern, Segment, WILDCARD_KEY};
use crate::routing::router::Router;
use crate::rpc::dispatcher::DEFAULT_ORIGIN;
use crate::rpc::Fetch;

/// Client mirroring the routes of one router.
#[derive(Debug, Clone)]
pub struct Fetcher<F> {
    stub: F,
    origin: String,
    routes: HashMap<(Verb, String), Pattern>,
}

impl<F: Fetch> Fetcher<F> {
    /// Generate accessors for every concrete-verb route of `router`.
    pub fn new<S>(router: &Router<S>, stub: F) -> Self
    where
        S: Clone + Send + Sync + 'static,
    {
        let routes = router
            .routes()
            .filter(|(verb, pattern)| *verb != Verb::All && !pattern.is_whole_path())
            .map(|(verb, pattern)| ((verb, pattern.source().to_string()), pattern.clone()))
            .collect();
        Self {
            stub,
            origin: DEFAULT_ORIGIN.to_string(),
            routes,
        }
    }

    /// Address requests to `origin`; any path in it is discarded.
    pub fn with_origin(mut self, origin: &str) -> Result<Self, url::ParseError> {
        self.origin = Url::parse(origin)?.origin().ascii_serialization();
        Ok(self)
    }

    /// The accessor for the route registered as `verb pattern`.
    pub fn request(&self, verb: Verb, pattern: &str) -> Result<RouteAccessor<'_, F>, FetchError> {
        let compiled = self
            .routes
            .get(&(verb, pattern.to_string()))
            .ok_or_else(|| FetchError::UnknownRoute {
                verb,
                pattern: pattern.to_string(),
            })?;
        Ok(RouteAccessor {
            fetcher: self,
            verb,
            pattern: compiled,
            params: Params::new(),
            body: None,
            headers: HeaderMap::new(),
        })
    }

    pub fn get(&self, pattern: &str) -> Result<RouteAccessor<'_, F>, FetchError> {
        self.request(Verb::Get, pattern)
    }

    pub fn post(&self, pattern: &str) -> Result<RouteAccessor<'_, F>, FetchError> {
        self.request(Verb::Post, pattern)
    }

    /// Untyped escape hatch: send `request` to `path` as is.
    pub async fn fetch(&self, path: &str, request: Request) -> Result<Response, FetchError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = format!("{}{}", self.origin, path)
            .parse::<Uri>()
            .map_err(|e| FetchError::InvalidRequest {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(self.stub.fetch(Request::from_parts(parts, body)).await?)
    }

    /// Number of generated accessors.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// One pending call against a single route.
#[derive(Debug)]
pub struct RouteAccessor<'a, F> {
    fetcher: &'a Fetcher<F>,
    verb: Verb,
    pattern: &'a Pattern,
    params: Params,
    body: Option<Bytes>,
    headers: HeaderMap,
}

impl<'a, F: Fetch> RouteAccessor<'a, F> {
    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Value substituted for a trailing `*`.
    pub fn wildcard(self, rest: impl Into<String>) -> Self {
        self.param(WILDCARD_KEY, rest)
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, FetchError> {
        let encoded = serde_json::to_vec(value).map_err(|e| FetchError::InvalidRequest {
            path: self.pattern.source().to_string(),
            reason: e.to_string(),
        })?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        self.body = Some(Bytes::from(encoded));
        Ok(self)
    }

    /// The concrete path with every parameter filled in.
    pub fn path(&self) -> Result<String, FetchError> {
        fill(self.pattern, &self.params)
    }

    pub async fn send(self) -> Result<Response, FetchError> {
        let path = self.path()?;
        let Some(method) = self.verb.method() else {
            return Err(FetchError::UnknownRoute {
                verb: self.verb,
                pattern: self.pattern.source().to_string(),
            });
        };
        let mut request = axum::http::Request::builder()
            .method(method)
            .uri(format!("{}{}", self.fetcher.origin, path))
            .body(self.body.unwrap_or_default())
            .map_err(|e| FetchError::InvalidRequest {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        request.headers_mut().extend(self.headers);
        Ok(self.fetcher.stub.fetch(request).await?)
    }

    /// Send and decode the response by status class.
    pub async fn invoke<T, E>(self) -> Result<Outcome<T, E>, FetchError>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        let response = self.send().await?;
        Ok(Outcome::decode(&response)?)
    }
}

fn fill(pattern: &Pattern, params: &Params) -> Result<String, FetchError> {
    let mut path = String::new();
    for segment in pattern.segments() {
        match segment {
            Segment::Literal(text) => {
                path.push('/');
                path.push_str(text);
            }
            Segment::Param(name) => {
                let value = params
                    .get(name)
                    .ok_or_else(|| FetchError::MissingParam(name.clone()))?;
                path.push('/');
                path.push_str(value);
            }
            Segment::Wildcard => {
                let rest = params
                    .get(WILDCARD_KEY)
                    .ok_or_else(|| FetchError::MissingParam(WILDCARD_KEY.to_string()))?;
                let rest = rest.trim_start_matches('/');
                if !rest.is_empty() {
                    path.push('/');
                    path.push_str(rest);
                }
            }
        }
    }
    if path.is_empty() {
        path.push('/');
    }
    Ok(path)
}
