//! HTTP server: route registration, dispatch and the accept loop.
//!
//! # Responsibilities
//! - Bridge hyper connections to route dispatch (`serve_http`)
//! - Own the route table and expose registration
//! - Run the blocking accept loop and track lifecycle state
//! - Wire the per-connection tower stack and drain connections on shutdown
//! - Bound each request by the configured timeout
//! - Contain handler panics so one request cannot take down the loop

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Method, Request, Response};
use futures_util::future::{BoxFuture, FutureExt};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower::{Service, ServiceBuilder};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::error::{WebError, WebResult};
use crate::http::context::{Context, PeerAddr};
use crate::http::handler::{handle_fn, HandleFunc};
use crate::http::response;
use crate::lifecycle::{ServerState, Shutdown};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::observability::metrics;
use crate::routing::{HandlerChain, Router};

/// Pause before accepting again after a transient accept error.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// The server abstraction.
///
/// Three capabilities: bridging transport to dispatch (`serve_http`),
/// lifecycle control (`start`), and route registration. Per-method
/// shorthands live on implementations, not here.
pub trait Server: Send + Sync {
    /// Dispatch one request: build the [`Context`], find the route, run it.
    ///
    /// Unmatched requests get `404 Not Found` and no handler runs.
    fn serve_http(&self, request: Request<Body>) -> impl Future<Output = Response<Body>> + Send;

    /// Bind `address` and serve until shutdown or a fatal accept error.
    ///
    /// Bind failures are returned before anything is served.
    fn start(&self, address: &str) -> impl Future<Output = WebResult<()>> + Send;

    /// Register exactly one handler for an exact method and path.
    fn add_route(&self, method: Method, path: &str, handler: HandleFunc) -> WebResult<()>;

    /// Register handlers that run one after another, in order, for a route.
    ///
    /// There is no short-circuit: every handler runs even if an earlier one
    /// wrote an error response.
    fn add_routes(&self, method: Method, path: &str, handlers: Vec<HandleFunc>) -> WebResult<()>;
}

struct ServerInner {
    config: ServerConfig,
    router: Router,
    state: watch::Sender<ServerState>,
    /// Set when the latest `start` attempt could not bind.
    bind_failed: watch::Sender<bool>,
    started: AtomicBool,
    shutdown: Shutdown,
    connections: ConnectionTracker,
}

/// HTTP/1.1 and HTTP/2 implementation of [`Server`].
///
/// Cloning is cheap and every clone refers to the same server.
#[derive(Clone)]
pub struct HttpServer {
    inner: Arc<ServerInner>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let (state, _) = watch::channel(ServerState::Unstarted);
        let (bind_failed, _) = watch::channel(false);
        Self {
            inner: Arc::new(ServerInner {
                config,
                router: Router::new(),
                state,
                bind_failed,
                started: AtomicBool::new(false),
                shutdown: Shutdown::new(),
                connections: ConnectionTracker::new(),
            }),
        }
    }

    /// Configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Route registry shared by every clone of this server.
    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// Wait until the server is serving and return its bound address.
    ///
    /// Returns `None` if the server stopped, or if the latest `start`
    /// attempt failed to bind.
    pub async fn wait_serving(&self) -> Option<SocketAddr> {
        let mut state = self.inner.state.subscribe();
        let mut bind_failed = self.inner.bind_failed.subscribe();

        tokio::select! {
            biased;
            reached = state.wait_for(|s| !matches!(s, ServerState::Unstarted)) => {
                reached.ok()?.local_addr()
            }
            _ = bind_failed.wait_for(|failed| *failed) => None,
        }
    }

    /// Handle that stops the accept loop when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.inner.shutdown.clone()
    }

    /// Connections currently open.
    pub fn active_connections(&self) -> u64 {
        self.inner.connections.active_count()
    }

    /// Register `handler` for `GET path`.
    pub fn get<F>(&self, path: &str, handler: F) -> WebResult<()>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.add_route(Method::GET, path, handle_fn(handler))
    }

    /// Register `handler` for `POST path`.
    pub fn post<F>(&self, path: &str, handler: F) -> WebResult<()>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.add_route(Method::POST, path, handle_fn(handler))
    }

    /// Register `handler` for `PUT path`.
    pub fn put<F>(&self, path: &str, handler: F) -> WebResult<()>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.add_route(Method::PUT, path, handle_fn(handler))
    }

    /// Register `handler` for `DELETE path`.
    pub fn delete<F>(&self, path: &str, handler: F) -> WebResult<()>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.add_route(Method::DELETE, path, handle_fn(handler))
    }

    /// Register `handler` for `PATCH path`.
    pub fn patch<F>(&self, path: &str, handler: F) -> WebResult<()>
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.add_route(Method::PATCH, path, handle_fn(handler))
    }

    async fn dispatch(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let mut ctx = Context::new(request, self.inner.config.limits.max_body_size);
        let method = ctx.method().clone();
        let timeout = Duration::from_secs(self.inner.config.timeouts.request_secs);

        let span = tracing::info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %method,
            path = %ctx.path(),
        );

        async {
            match self.inner.router.resolve(&method, ctx.path()) {
                Ok(chain) => {
                    let finished = tokio::time::timeout(timeout, run_chain(&chain, &mut ctx)).await;
                    if finished.is_err() {
                        tracing::warn!(timeout_secs = timeout.as_secs(), "Request timed out");
                        response::request_timeout(&mut ctx);
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "No route matched");
                    response::not_found(&mut ctx);
                }
            }
            tracing::debug!(
                status = ctx.response().status().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request handled"
            );
        }
        .instrument(span)
        .await;

        let response = ctx.into_response();
        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        response
    }

    /// Accept until shutdown or a fatal error, then wait for every open
    /// connection to finish.
    async fn accept_loop(&self, listener: Listener) -> WebResult<()> {
        let mut shutdown = self.inner.shutdown.subscribe();
        let mut connections = JoinSet::new();

        let result = loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(
                        active_connections = self.active_connections(),
                        accepted = self.inner.connections.accepted_count(),
                        "Shutdown triggered, no longer accepting connections"
                    );
                    break Ok(());
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::warn!(error = %e, "Connection task failed");
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        self.spawn_connection(&mut connections, stream, peer, permit)
                    }
                    Err(e) if e.is_transient() => {
                        tracing::warn!(error = %e, "Transient accept error");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Accept loop failed");
                        // Open connections wind down the same way as on shutdown.
                        self.inner.shutdown.trigger();
                        break Err(e.into());
                    }
                },
            }
        };

        drop(listener);
        if !connections.is_empty() {
            tracing::info!(connections = connections.len(), "Draining open connections");
        }
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "Connection task failed");
            }
        }
        result
    }

    /// Serve one accepted connection on a task owned by `connections`.
    ///
    /// The connection closes gracefully once shutdown is triggered.
    fn spawn_connection(
        &self,
        connections: &mut JoinSet<()>,
        stream: TcpStream,
        peer: SocketAddr,
        permit: ConnectionPermit,
    ) {
        let guard = self.inner.connections.open(peer);
        let mut shutdown = self.inner.shutdown.subscribe();

        let service = ServiceBuilder::new()
            .map_request(move |request: Request<Incoming>| {
                let mut request = request.map(Body::new);
                request.extensions_mut().insert(PeerAddr(peer));
                request
            })
            .layer(TraceLayer::new_for_http())
            .service(self.clone());
        let service = TowerToHyperService::new(service);

        connections.spawn(async move {
            let _permit = permit;
            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let mut draining = false;
            let result = loop {
                tokio::select! {
                    res = conn.as_mut() => break res,
                    _ = shutdown.recv(), if !draining => {
                        draining = true;
                        conn.as_mut().graceful_shutdown();
                    }
                }
            };

            if let Err(e) = result {
                tracing::debug!(
                    connection_id = %guard.id(),
                    peer_addr = %peer,
                    error = %e,
                    "Connection error"
                );
            }
        });
    }
}

/// Run every handler of a route in order.
///
/// A panicking handler stops the chain and turns the response into a 500.
async fn run_chain(chain: &HandlerChain, ctx: &mut Context) {
    for (index, handler) in chain.iter().enumerate() {
        let outcome = AssertUnwindSafe(handler.call(ctx)).catch_unwind().await;
        if let Err(panic) = outcome {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            tracing::error!(handler = index, panic = %message, "Handler panicked");
            response::internal_error(ctx);
            return;
        }
    }
}

async fn bind(address: &str, config: &ServerConfig) -> Result<(Listener, SocketAddr), ListenerError> {
    let listener = Listener::bind(address, config.listener.max_connections).await?;
    let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
        address: address.to_string(),
        source,
    })?;
    Ok((listener, local_addr))
}

impl Server for HttpServer {
    async fn serve_http(&self, request: Request<Body>) -> Response<Body> {
        self.dispatch(request).await
    }

    async fn start(&self, address: &str) -> WebResult<()> {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WebError::AlreadyStarted);
        }
        self.inner.bind_failed.send_replace(false);

        let (listener, local_addr) = match bind(address, self.config()).await {
            Ok(bound) => bound,
            Err(e) => {
                // Still unstarted: the caller may retry with another address.
                self.inner.started.store(false, Ordering::SeqCst);
                self.inner.bind_failed.send_replace(true);
                return Err(e.into());
            }
        };

        self.inner
            .state
            .send_replace(ServerState::Serving { local_addr });
        tracing::info!(
            address = %local_addr,
            routes = self.inner.router.snapshot().len(),
            "HTTP server starting"
        );

        let result = self.accept_loop(listener).await;

        self.inner.state.send_replace(ServerState::Stopped);
        tracing::info!("HTTP server stopped");
        result
    }

    fn add_route(&self, method: Method, path: &str, handler: HandleFunc) -> WebResult<()> {
        self.inner.router.register(method, path, vec![handler])
    }

    fn add_routes(&self, method: Method, path: &str, handlers: Vec<HandleFunc>) -> WebResult<()> {
        self.inner.router.register(method, path, handlers)
    }
}

/// Lets the server be mounted in any tower or axum stack.
impl Service<Request<Body>> for HttpServer {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let server = self.clone();
        Box::pin(async move { Ok(server.dispatch(request).await) })
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("state", &self.state())
            .field("router", &self.inner.router)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handler::Handler;
    use crate::http::response::{INTERNAL_ERROR_BODY, NOT_FOUND_BODY, REQUEST_TIMEOUT_BODY};
    use axum::http::StatusCode;
    use std::sync::atomic::AtomicUsize;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        HttpServer::new(ServerConfig::default())
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn counting(hits: &Arc<AtomicUsize>) -> HandleFunc {
        let hits = hits.clone();
        handle_fn(move |ctx| {
            hits.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                ctx.text(StatusCode::OK, "counted");
            })
        })
    }

    fn writes(chunk: &'static str) -> HandleFunc {
        handle_fn(move |ctx| {
            Box::pin(async move {
                ctx.response().write_bytes(chunk.as_bytes());
            })
        })
    }

    #[tokio::test]
    async fn ping_returns_pong() {
        let server = server();
        server
            .get("/ping", |ctx| {
                Box::pin(async move {
                    ctx.text(StatusCode::OK, "pong");
                })
            })
            .unwrap();

        let response = server.serve_http(request(Method::GET, "/ping", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "pong");
    }

    #[tokio::test]
    async fn registered_handler_runs_once_per_request() {
        let server = server();
        let hits = Arc::new(AtomicUsize::new(0));
        server
            .add_route(Method::GET, "/count", counting(&hits))
            .unwrap();

        for expected in 1..=3 {
            let response = server.serve_http(request(Method::GET, "/count", "")).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(hits.load(Ordering::SeqCst), expected);
        }
    }

    #[tokio::test]
    async fn missing_route_is_404_without_side_effects() {
        let server = server();
        let hits = Arc::new(AtomicUsize::new(0));
        server
            .add_route(Method::GET, "/ping", counting(&hits))
            .unwrap();

        for (method, uri) in [
            (Method::GET, "/missing"),
            (Method::POST, "/ping"),
            (Method::GET, "/ping/"),
        ] {
            let response = server.serve_http(request(method, uri, "")).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(body_text(response).await, NOT_FOUND_BODY);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn query_string_is_not_part_of_the_route() {
        let server = server();
        server
            .get("/search", |ctx| {
                Box::pin(async move {
                    let term = ctx.query("q").unwrap_or_else(|| "none".into());
                    ctx.text(StatusCode::OK, term);
                })
            })
            .unwrap();

        let response = server
            .serve_http(request(Method::GET, "/search?q=rust", ""))
            .await;
        assert_eq!(body_text(response).await, "rust");
    }

    #[tokio::test]
    async fn echo_copies_body() {
        let server = server();
        server
            .post("/echo", |ctx| {
                Box::pin(async move {
                    let body = ctx.body().await.unwrap();
                    ctx.response().write_bytes(&body);
                })
            })
            .unwrap();

        let response = server
            .serve_http(request(Method::POST, "/echo", "hello"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "hello");
    }

    #[tokio::test]
    async fn paths_do_not_cross_talk() {
        let server = server();
        server.add_route(Method::GET, "/a", writes("a")).unwrap();
        server.add_route(Method::GET, "/b", writes("b")).unwrap();
        server.add_route(Method::DELETE, "/a", writes("deleted")).unwrap();

        let a = server.serve_http(request(Method::GET, "/a", "")).await;
        let b = server.serve_http(request(Method::GET, "/b", "")).await;
        let del = server.serve_http(request(Method::DELETE, "/a", "")).await;
        assert_eq!(body_text(a).await, "a");
        assert_eq!(body_text(b).await, "b");
        assert_eq!(body_text(del).await, "deleted");
    }

    #[tokio::test]
    async fn duplicate_route_keeps_first_handler() {
        let server = server();
        server.add_route(Method::GET, "/dup", writes("first")).unwrap();

        let err = server
            .add_route(Method::GET, "/dup", writes("second"))
            .unwrap_err();
        assert!(matches!(
            err,
            WebError::DuplicateRoute { ref method, ref path } if *method == Method::GET && path == "/dup"
        ));

        let response = server.serve_http(request(Method::GET, "/dup", "")).await;
        assert_eq!(body_text(response).await, "first");
    }

    #[tokio::test]
    async fn invalid_registrations_are_rejected() {
        let server = server();
        assert!(matches!(
            server.add_route(Method::GET, "no-slash", writes("x")),
            Err(WebError::InvalidPath(_))
        ));
        assert!(matches!(
            server.add_routes(Method::GET, "/empty", Vec::new()),
            Err(WebError::EmptyHandlerChain { .. })
        ));
        assert!(server.router().snapshot().is_empty());
    }

    #[tokio::test]
    async fn chain_runs_in_registration_order() {
        let server = server();
        server
            .add_routes(Method::GET, "/chain", vec![writes("a"), writes("b"), writes("c")])
            .unwrap();

        let response = server.serve_http(request(Method::GET, "/chain", "")).await;
        assert_eq!(body_text(response).await, "abc");
    }

    #[tokio::test]
    async fn chain_does_not_short_circuit() {
        let server = server();
        let hits = Arc::new(AtomicUsize::new(0));
        let reject = handle_fn(|ctx| {
            Box::pin(async move {
                ctx.text(StatusCode::BAD_REQUEST, "rejected;");
            })
        });
        server
            .add_routes(Method::POST, "/chain", vec![reject, counting(&hits)])
            .unwrap();

        let response = server.serve_http(request(Method::POST, "/chain", "")).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // The second handler's `text` overwrote the status and appended its body.
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "rejected;counted");
    }

    #[tokio::test]
    async fn panicking_handler_becomes_500() {
        let server = server();
        let hits = Arc::new(AtomicUsize::new(0));
        let explode = handle_fn(|ctx| {
            Box::pin(async move {
                ctx.text(StatusCode::OK, "partial");
                panic!("handler exploded");
            })
        });
        server
            .add_routes(Method::GET, "/boom", vec![explode, counting(&hits)])
            .unwrap();
        server.add_route(Method::GET, "/ok", writes("fine")).unwrap();

        let response = server.serve_http(request(Method::GET, "/boom", "")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, INTERNAL_ERROR_BODY);
        assert_eq!(hits.load(Ordering::SeqCst), 0, "chain continued after panic");

        let response = server.serve_http(request(Method::GET, "/ok", "")).await;
        assert_eq!(body_text(response).await, "fine");
    }

    struct Greeter {
        greeting: String,
    }

    impl Handler for Greeter {
        fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                let name = ctx.query("name").unwrap_or_else(|| "world".into());
                ctx.text(StatusCode::OK, format!("{}, {}", self.greeting, name));
            })
        }
    }

    #[tokio::test]
    async fn stateful_handler_struct() {
        let server = server();
        let greeter = crate::http::handler::handler(Greeter {
            greeting: "hello".into(),
        });
        server.add_route(Method::GET, "/greet", greeter).unwrap();

        let response = server
            .serve_http(request(Method::GET, "/greet?name=ferris", ""))
            .await;
        assert_eq!(body_text(response).await, "hello, ferris");
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let server = server();
        server.add_route(Method::GET, "/id", writes("")).unwrap();

        let request = Request::builder()
            .uri("/id")
            .header("x-request-id", "trace-42")
            .body(Body::empty())
            .unwrap();
        let response = server.serve_http(request).await;
        assert_eq!(response.headers()["x-request-id"], "trace-42");

        let response = server.serve_http(request_for_missing()).await;
        assert!(response.headers().contains_key("x-request-id"));
    }

    fn request_for_missing() -> Request<Body> {
        request(Method::GET, "/nowhere", "")
    }

    #[tokio::test]
    async fn tower_service_dispatches() {
        let server = server();
        server.add_route(Method::GET, "/svc", writes("via tower")).unwrap();

        let response = server
            .clone()
            .oneshot(request(Method::GET, "/svc", ""))
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "via tower");
    }

    #[tokio::test]
    async fn start_reports_bind_conflict() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let server = server();
        let err = server.start(&addr).await.unwrap_err();
        assert!(matches!(err, WebError::Bind { ref address, .. } if *address == addr));
        assert_eq!(server.state(), ServerState::Unstarted);
    }

    #[tokio::test]
    async fn lifecycle_unstarted_serving_stopped() {
        let server = server();
        assert_eq!(server.state(), ServerState::Unstarted);

        let running = server.clone();
        let handle = tokio::spawn(async move { running.start("127.0.0.1:0").await });

        let local_addr = server.wait_serving().await.expect("server stopped early");
        assert_ne!(local_addr.port(), 0);
        assert_eq!(server.state(), ServerState::Serving { local_addr });
        assert!(matches!(
            server.start("127.0.0.1:0").await,
            Err(WebError::AlreadyStarted)
        ));

        server.shutdown_handle().trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("start did not return after shutdown")
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(server.wait_serving().await, None);
    }

    #[tokio::test]
    async fn slow_chain_times_out_inside_dispatch() {
        let mut config = ServerConfig::default();
        config.timeouts.request_secs = 1;
        let server = HttpServer::new(config);
        let hits = Arc::new(AtomicUsize::new(0));
        let stall = handle_fn(|ctx| {
            Box::pin(async move {
                ctx.text(StatusCode::OK, "partial");
                tokio::time::sleep(Duration::from_secs(5)).await;
            })
        });
        server
            .add_routes(Method::GET, "/stall", vec![stall, counting(&hits)])
            .unwrap();

        let request = Request::builder()
            .uri("/stall")
            .header("x-request-id", "slow-1")
            .body(Body::empty())
            .unwrap();
        let response = server.serve_http(request).await;

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()["x-request-id"], "slow-1");
        assert_eq!(body_text(response).await, REQUEST_TIMEOUT_BODY);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wait_serving_gives_up_after_bind_failure() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let server = server();

        let waiter = {
            let server = server.clone();
            tokio::spawn(async move { server.wait_serving().await })
        };
        tokio::task::yield_now().await;

        assert!(server.start(&addr).await.is_err());
        let woken = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter still pending after bind failure")
            .unwrap();
        assert_eq!(woken, None);

        // Callers arriving after the failure return immediately as well.
        let late = tokio::time::timeout(Duration::from_secs(2), server.wait_serving())
            .await
            .expect("late waiter hung");
        assert_eq!(late, None);
        assert_eq!(server.state(), ServerState::Unstarted);
    }
}
