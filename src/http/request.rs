//! Request helpers.
//!
//! # Responsibilities
//! - Buffer an inbound axum request into the router's `Request` type
//! - Detect WebSocket upgrade handshakes
//! - Re-address a request to another path (mounting a unit under a prefix)

use axum::body::Bytes;
use axum::http::uri::PathAndQuery;
use axum::http::{header, Method, Uri};

use crate::http::Request;

/// Buffer the body of an inbound request, up to `limit` bytes.
pub async fn collect(request: axum::extract::Request, limit: usize) -> Result<Request, axum::Error> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, limit).await?;
    Ok(Request::from_parts(parts, bytes))
}

/// Returns true for `GET` requests carrying `Upgrade: websocket`.
pub fn is_websocket_upgrade<B>(request: &axum::http::Request<B>) -> bool {
    request.method() == Method::GET
        && request
            .headers()
            .get(header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
}

/// Rewrite the path of `request`, keeping its query string, method, headers and body.
pub fn with_path(request: Request, path: &str) -> Result<Request, axum::http::Error> {
    let (mut parts, body) = request.into_parts();
    let path_and_query = match parts.uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    parts.uri = Uri::from_parts(uri_parts)?;
    Ok(Request::from_parts(parts, body))
}

/// Empty-bodied request, mostly for tests and synthetic calls.
pub fn empty(method: Method, uri: &str) -> Result<Request, axum::http::Error> {
    axum::http::Request::builder().method(method).uri(uri).body(Bytes::new())
}
