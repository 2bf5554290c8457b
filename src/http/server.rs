//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router around a unit entry point
//! - Wire up middleware (tracing, timeout)
//! - Buffer request bodies up to the configured limit
//! - Hand WebSocket upgrades on the session path to a `SessionPool`
//! - Bind server to listener and stop on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{FromRequestParts, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::HostConfig;
use crate::http::request::{self, is_websocket_upgrade};
use crate::http::{response, websocket};
use crate::rpc::Fetch;
use crate::sessions::{Session, SessionPool};

/// Hook run on every newly accepted session.
pub type SessionSetup = Arc<dyn Fn(&Arc<Session>) + Send + Sync>;

#[derive(Clone)]
struct SessionMount {
    path: String,
    pool: Arc<SessionPool>,
    setup: SessionSetup,
}

/// Application state injected into handlers.
#[derive(Clone)]
struct AppState {
    unit: Arc<dyn Fetch>,
    max_body_bytes: usize,
    sessions: Option<SessionMount>,
}

/// HTTP host for one addressable unit.
pub struct HttpServer {
    config: HostConfig,
    state: AppState,
}

impl HttpServer {
    /// Serve `unit` with the given configuration.
    pub fn new(config: HostConfig, unit: Arc<dyn Fetch>) -> Self {
        let state = AppState {
            unit,
            max_body_bytes: config.limits.max_body_bytes,
            sessions: None,
        };
        Self { config, state }
    }

    /// Accept WebSocket upgrades on `path` into `pool`, running `setup` on each new session.
    pub fn with_sessions<F>(mut self, path: &str, pool: Arc<SessionPool>, setup: F) -> Self
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        self.state.sessions = Some(SessionMount {
            path: path.to_string(),
            pool,
            setup: Arc::new(setup),
        });
        self
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(entry)
            .with_state(self.state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}

/// Single entry: upgrades on the session path, everything else to the unit.
async fn entry(State(state): State<AppState>, request: axum::extract::Request) -> axum::response::Response {
    if let Some(mount) = &state.sessions {
        if request.uri().path() == mount.path && is_websocket_upgrade(&request) {
            return upgrade(mount.clone(), request).await;
        }
    }

    let request = match request::collect(request, state.max_body_bytes).await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Request body rejected");
            return response::error(StatusCode::PAYLOAD_TOO_LARGE, &e.to_string())
                .map(Body::from)
                .into_response();
        }
    };

    match state.unit.fetch(request).await {
        Ok(response) => response.map(Body::from).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Unit unreachable");
            response::error(StatusCode::BAD_GATEWAY, &e.to_string())
                .map(Body::from)
                .into_response()
        }
    }
}

async fn upgrade(mount: SessionMount, request: axum::extract::Request) -> axum::response::Response {
    let (mut parts, _body) = request.into_parts();
    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| async move {
        let setup = Arc::clone(&mount.setup);
        let peer = mount.pool.accept(|session| (*setup)(session));
        websocket::bridge(socket, peer).await;
    })
}
