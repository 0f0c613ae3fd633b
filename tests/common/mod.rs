//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::task::JoinHandle;
use web_server::{HttpServer, Server, ServerConfig, Shutdown, WebError, WebResult};

/// Start `server` on an ephemeral loopback port.
///
/// Returns once the server is accepting connections.
pub async fn spawn_server(server: &HttpServer) -> (SocketAddr, Shutdown, JoinHandle<WebResult<()>>) {
    spawn_server_on(server, "127.0.0.1:0").await
}

pub async fn spawn_server_on(
    server: &HttpServer,
    address: &'static str,
) -> (SocketAddr, Shutdown, JoinHandle<WebResult<()>>) {
    let running = server.clone();
    let handle = tokio::spawn(async move { running.start(address).await });

    let addr = tokio::time::timeout(Duration::from_secs(5), server.wait_serving())
        .await
        .expect("server did not start in time")
        .expect("server stopped before serving");

    (addr, server.shutdown_handle(), handle)
}

/// Client without connection pooling or system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Server with the routes most tests need: `/ping`, `/echo`, `/slow`.
pub fn demo_server(config: ServerConfig) -> HttpServer {
    let server = HttpServer::new(config);

    server
        .get("/ping", |ctx| {
            Box::pin(async move {
                ctx.text(StatusCode::OK, "pong");
            })
        })
        .unwrap();

    server
        .post("/echo", |ctx| {
            Box::pin(async move {
                match ctx.body().await {
                    Ok(body) => ctx.response().write_bytes(&body),
                    Err(e @ WebError::BodyTooLarge { .. }) => {
                        ctx.text(StatusCode::PAYLOAD_TOO_LARGE, e.to_string())
                    }
                    Err(e) => ctx.text(StatusCode::BAD_REQUEST, e.to_string()),
                }
            })
        })
        .unwrap();

    server
        .get("/slow", |ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                ctx.text(StatusCode::OK, "finally");
            })
        })
        .unwrap();

    server
}
