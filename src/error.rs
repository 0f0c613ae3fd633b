//! Error types shared across the server.

use axum::http::Method;

use crate::config::loader::ConfigError;
use crate::net::listener::ListenerError;

/// Errors surfaced by registration, lifecycle and request handling.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// `start` could not acquire the requested address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop hit an error it cannot recover from.
    #[error("accept loop failed: {0}")]
    Accept(#[source] std::io::Error),

    /// `start` was called on a server that already started.
    #[error("server already started")]
    AlreadyStarted,

    /// No handler is registered for the method and path.
    #[error("no route for {method} {path}")]
    RouteNotFound { method: Method, path: String },

    /// The method and path already have handlers.
    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },

    /// `add_routes` was given no handlers.
    #[error("route {method} {path} needs at least one handler")]
    EmptyHandlerChain { method: Method, path: String },

    /// Registration path is not an absolute URI path.
    #[error("invalid route path {0:?}: must start with '/' and contain no query or fragment")]
    InvalidPath(String),

    /// Declared request body length exceeds the configured limit.
    #[error("request body of {length} bytes exceeds the {limit} byte limit")]
    BodyTooLarge { length: u64, limit: usize },

    /// Query string does not fit the requested shape.
    #[error("invalid query string: {0}")]
    Query(#[from] serde_urlencoded::de::Error),

    /// Request body could not be read.
    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("failed to encode JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ListenerError> for WebError {
    fn from(err: ListenerError) -> Self {
        match err {
            ListenerError::Bind { address, source } => WebError::Bind { address, source },
            ListenerError::Accept(source) => WebError::Accept(source),
        }
    }
}

pub type WebResult<T> = Result<T, WebError>;
