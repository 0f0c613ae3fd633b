//! A small web server: exact (method, path) routing over hyper, with a
//! per-request [`Context`], a blocking `start` lifecycle and a shutdown hook.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use error::{WebError, WebResult};
pub use http::{handle_fn, Context, HandleFunc, Handler, HttpServer, Server};
pub use lifecycle::{ServerState, Shutdown};

pub use futures_util::future::BoxFuture;
