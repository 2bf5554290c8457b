//! The `Fetch` capability: an opaque way to deliver a request to a unit.
//!
//! # Implementations
//! - `RouterService` / `Unit`: in-process entry points
//! - `HttpStub`: a unit reachable over HTTP at a fixed origin
//!
//! # Design Decisions
//! - No timeout, retry or cancellation here; that belongs to the transport
//! - Transport failures are returned, never retried

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use url::Url;

use crate::error::TransportError;
use crate::http::{Request, Response};

/// Something that can take a request to an addressable unit and bring back its response.
pub trait Fetch: Send + Sync {
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>>;
}

impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        (**self).fetch(request)
    }
}

impl<T: Fetch + ?Sized> Fetch for &T {
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        (**self).fetch(request)
    }
}

/// A remote unit reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStub {
    client: reqwest::Client,
    origin: Url,
}

impl HttpStub {
    /// Create a stub for the unit served at `origin` (e.g. `http://10.0.0.7:8080`).
    pub fn new(origin: &str) -> Result<Self, TransportError> {
        Self::with_client(reqwest::Client::new(), origin)
    }

    pub fn with_client(client: reqwest::Client, origin: &str) -> Result<Self, TransportError> {
        let origin = Url::parse(origin).map_err(|source| TransportError::InvalidOrigin {
            origin: origin.to_string(),
            source,
        })?;
        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let (parts, body) = request.into_parts();
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = self
            .origin
            .join(target)
            .map_err(|source| TransportError::InvalidOrigin {
                origin: format!("{}{}", self.origin, target),
                source,
            })?;

        tracing::debug!(method = %parts.method, url = %url, "Forwarding to remote unit");

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(parts.headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let headers = upstream.headers().clone();
        let bytes = upstream.bytes().await?;

        let mut response = Response::new(bytes);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

impl Fetch for HttpStub {
    fn fetch(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        self.send(request).boxed()
    }
}
