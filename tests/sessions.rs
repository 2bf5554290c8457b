//! WebSocket sessions through the host server.

use std::sync::Arc;

use axum::http::StatusCode;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use unit_router::http::response;
use unit_router::http::HttpServer;
use unit_router::routing::{RouteContext, Router};
use unit_router::sessions::{Connection, Frame, SessionPool};

mod common;

type Pool = Arc<SessionPool>;

async fn start_room() -> (std::net::SocketAddr, unit_router::Shutdown, Pool) {
    let pool: Pool = Arc::new(SessionPool::new());
    let router = Router::builder()
        .post("/say", |ctx: RouteContext, pool: Pool| async move {
            let text = String::from_utf8_lossy(ctx.request.body()).into_owned();
            let delivered = pool.broadcast(&Frame::Text(text), &[]);
            response::ok(StatusCode::OK, &delivered)
        })
        .build()
        .unwrap();

    let relay_pool = Arc::clone(&pool);
    let server = HttpServer::new(common::config(), Arc::new(router.with_state(Arc::clone(&pool))))
        .with_sessions("/connect", Arc::clone(&pool), move |session| {
            let Some(mut incoming) = session.take_incoming() else {
                return;
            };
            let pool = Arc::clone(&relay_pool);
            let session = Arc::clone(session);
            tokio::spawn(async move {
                while let Some(frame) = incoming.recv().await {
                    if matches!(frame, Frame::Close { .. }) {
                        break;
                    }
                    pool.broadcast(&frame, &[session.id()]);
                }
                pool.disconnect(&session, &Default::default());
            });
        });
    let (addr, shutdown) = common::start(server).await;
    (addr, shutdown, pool)
}

async fn next_text<S>(socket: &mut S) -> String
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match socket.next().await {
            Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
            Some(Ok(_)) => continue,
            other => panic!("socket ended: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_broadcast_reaches_connected_sockets() {
    let (addr, shutdown, pool) = start_room().await;
    let url = format!("ws://{}/connect", addr);

    let (mut alice, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut bob, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    assert!(common::eventually(|| pool.len() == 2).await);

    let res = common::client()
        .post(format!("http://{}/say", addr))
        .body("hello room")
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<usize>().await.unwrap(), 2);

    assert_eq!(next_text(&mut alice).await, "hello room");
    assert_eq!(next_text(&mut bob).await, "hello room");

    // Relay excludes the sender.
    alice.send(Message::text("from alice")).await.unwrap();
    assert_eq!(next_text(&mut bob).await, "from alice");

    shutdown.trigger();
}

#[tokio::test]
async fn test_closed_socket_leaves_pool() {
    let (addr, shutdown, pool) = start_room().await;
    let url = format!("ws://{}/connect", addr);

    let (mut alice, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (_bob, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    assert!(common::eventually(|| pool.len() == 2).await);

    alice.close(None).await.unwrap();
    assert!(common::eventually(|| pool.len() == 1).await);

    shutdown.trigger();
}

#[tokio::test]
async fn test_plain_request_on_session_path_reaches_unit() {
    let (addr, shutdown, _pool) = start_room().await;

    let res = common::client()
        .get(format!("http://{}/connect", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
}
