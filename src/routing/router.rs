//! Route registration and lookup over published snapshots.
//!
//! # Design Decisions
//! - Dispatch loads the current `Arc<RouteTable>` without locking
//! - Registration copies the table, inserts, and swaps the copy in
//! - A writer mutex keeps two registrations from overwriting each other

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use axum::http::Method;

use crate::error::WebResult;
use crate::http::handler::HandleFunc;
use crate::routing::table::{HandlerChain, RouteTable};

pub struct Router {
    table: ArcSwap<RouteTable>,
    write_lock: Mutex<()>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Register a handler chain for one (method, path) pair.
    pub fn register(&self, method: Method, path: &str, handlers: Vec<HandleFunc>) -> WebResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let count = handlers.len();
        let next = self.table.load().with_route(method.clone(), path, handlers)?;
        self.table.store(Arc::new(next));

        tracing::debug!(method = %method, path = %path, handlers = count, "Route registered");
        Ok(())
    }

    /// Look up the chain for a request.
    pub fn resolve(&self, method: &Method, path: &str) -> WebResult<HandlerChain> {
        self.table.load().lookup(method, path)
    }

    /// The currently published table.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("table", &*self.table.load())
            .finish()
    }
}
