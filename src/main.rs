//! `unit-host`: serves a small chat-room unit.
//!
//! ```text
//!   GET  /health            liveness
//!   GET  /members           open session count
//!   POST /messages          {"author", "text"} broadcast to every session
//!   GET  /count             counter value, read through an RpcClient
//!   ALL  /rpc/*             counter unit entry point (increment, value)
//!   GET  /connect           WebSocket upgrade into the room
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::BoxError;

use unit_router::config::{load_config, HostConfig};
use unit_router::http::request::with_path;
use unit_router::http::{response, HttpServer, Response};
use unit_router::lifecycle::{signals, Shutdown};
use unit_router::observability::{logging, metrics};
use unit_router::routing::{validator, RouteContext, Router, Verb};
use unit_router::rpc::{RpcClient, Unit};
use unit_router::sessions::{CloseReason, Connection, Frame, Session, SessionPool};

#[derive(Parser, Debug)]
#[command(name = "unit-host", version, about = "Serve the chat-room demo unit")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    author: String,
    text: String,
}

type Counter = Unit<Arc<AtomicU64>>;

#[derive(Clone)]
struct Room {
    pool: Arc<SessionPool>,
    counter: Counter,
    origin: Arc<str>,
}

fn counter_unit() -> Result<Counter, BoxError> {
    let unit = Unit::builder(Arc::new(AtomicU64::new(0)))
        .method("increment", |n: Arc<AtomicU64>, _call, (by,): (u64,)| async move {
            let total = n.fetch_add(by, Ordering::SeqCst) + by;
            response::ok(StatusCode::OK, &total)
        })
        .method("value", |n: Arc<AtomicU64>, _call, (): ()| async move {
            response::ok(StatusCode::OK, &n.load(Ordering::SeqCst))
        })
        .build()?;
    Ok(unit)
}

fn room_router() -> Result<Router<Room>, BoxError> {
    let router = Router::builder()
        .get("/health", |_ctx, _room: Room| async {
            response::ok(StatusCode::OK, "ok")
        })
        .get("/members", |_ctx, room: Room| async move {
            response::ok(StatusCode::OK, &room.pool.len())
        })
        .validated(
            Verb::Post,
            "/messages",
            validator::typed::<ChatMessage>(),
            |ctx: RouteContext, room: Room| async move {
                let message: ChatMessage = ctx.value_as().ok_or("missing message")??;
                let line = format!("{}: {}", message.author, message.text);
                let delivered = room.pool.broadcast(&Frame::Text(line), &[]);
                Ok::<Response, BoxError>(response::ok(
                    StatusCode::ACCEPTED,
                    &serde_json::json!({ "delivered": delivered }),
                ))
            },
        )
        .get("/count", |ctx: RouteContext, room: Room| async move {
            let client = RpcClient::new(room.counter)
                .with_origin(&room.origin)?
                .forwarding(&ctx.request);
            let value = client.invoke::<u64, String, _>("value", &()).await?;
            Ok::<Response, BoxError>(match value.into_result() {
                Ok(count) => response::ok(StatusCode::OK, &count),
                Err((status, message)) => response::error(status, &message),
            })
        })
        .all("/rpc/*", |ctx: RouteContext, room: Room| async move {
            let method = format!("/{}", ctx.wildcard().unwrap_or_default());
            let request = with_path(ctx.request, &method)?;
            Ok::<Response, BoxError>(room.counter.handle(request).await)
        })
        .build()?;
    Ok(router)
}

/// Relay every frame a session sends to the rest of the room.
fn relay(pool: Arc<SessionPool>) -> impl Fn(&Arc<Session>) + Send + Sync + 'static {
    move |session| {
        let Some(mut incoming) = session.take_incoming() else {
            return;
        };
        let pool = Arc::clone(&pool);
        let session = Arc::clone(session);
        tokio::spawn(async move {
            while let Some(frame) = incoming.recv().await {
                if let Frame::Close { .. } = frame {
                    break;
                }
                pool.broadcast(&frame, &[session.id()]);
            }
            pool.disconnect(&session, &CloseReason::default());
        });
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HostConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(Some(&config.observability.log_filter));
    tracing::info!("unit-host v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pool = Arc::new(SessionPool::new());
    let room = Room {
        pool: Arc::clone(&pool),
        counter: counter_unit()?,
        origin: Arc::from(config.rpc.origin.as_str()),
    };
    let service = room_router()?.with_state(room);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config, Arc::new(service)).with_sessions(
        "/connect",
        Arc::clone(&pool),
        relay(Arc::clone(&pool)),
    );
    server.run(listener, shutdown.subscribe()).await?;

    pool.close_all(&CloseReason::new(1001, "server shutting down"));
    tracing::info!("Shutdown complete");
    Ok(())
}
