//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use unit_router::config::HostConfig;
use unit_router::http::HttpServer;
use unit_router::lifecycle::Shutdown;
use unit_router::rpc::Fetch;

/// Default config bound to an ephemeral local port.
pub fn config() -> HostConfig {
    let mut config = HostConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Serve `unit` on an ephemeral port; the listener is bound before this returns.
pub async fn serve(unit: Arc<dyn Fetch>) -> (SocketAddr, Shutdown) {
    start(HttpServer::new(config(), unit)).await
}

/// Run an already configured server on an ephemeral port.
pub async fn start(server: HttpServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// HTTP client that never reuses connections or goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
