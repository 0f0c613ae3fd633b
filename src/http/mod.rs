//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper connection, tower stack: trace, timeout)
//!     → server.rs dispatch (Context construction, route lookup)
//!     → server.rs run_chain (handlers in order, panic boundary)
//!     → context.rs (response written by handlers)
//!     → Send to client
//! ```

pub mod context;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use context::{Context, PeerAddr, ResponseWriter};
pub use handler::{handle_fn, handler, HandleFunc, Handler};
pub use request::{RequestId, X_REQUEST_ID};
pub use server::{HttpServer, Server};
