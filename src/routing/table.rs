//! Immutable route table snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use crate::error::{WebError, WebResult};
use crate::http::handler::HandleFunc;

/// Handlers registered for one route, in invocation order.
pub type HandlerChain = Arc<[HandleFunc]>;

/// Check that `path` is something a request URI path can equal.
pub fn validate_path(path: &str) -> WebResult<()> {
    if !path.starts_with('/') || path.contains(['?', '#']) {
        return Err(WebError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Maps (method, exact path) to a handler chain.
#[derive(Default, Clone)]
pub struct RouteTable {
    routes: HashMap<Method, HashMap<String, HandlerChain>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this table with one more route.
    ///
    /// `self` is left untouched, so a failed insert never disturbs the
    /// routes already published.
    pub fn with_route(
        &self,
        method: Method,
        path: &str,
        handlers: Vec<HandleFunc>,
    ) -> WebResult<Self> {
        validate_path(path)?;
        if handlers.is_empty() {
            return Err(WebError::EmptyHandlerChain {
                method,
                path: path.to_string(),
            });
        }
        if self.contains(&method, path) {
            return Err(WebError::DuplicateRoute {
                method,
                path: path.to_string(),
            });
        }

        let mut next = self.clone();
        next.routes
            .entry(method)
            .or_default()
            .insert(path.to_string(), handlers.into());
        Ok(next)
    }

    /// Find the chain registered for exactly this method and path.
    pub fn lookup(&self, method: &Method, path: &str) -> WebResult<HandlerChain> {
        self.routes
            .get(method)
            .and_then(|paths| paths.get(path))
            .cloned()
            .ok_or_else(|| WebError::RouteNotFound {
                method: method.clone(),
                path: path.to_string(),
            })
    }

    pub fn contains(&self, method: &Method, path: &str) -> bool {
        self.routes
            .get(method)
            .is_some_and(|paths| paths.contains_key(path))
    }

    /// Number of registered (method, path) pairs.
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered (method, path) pairs, sorted for stable output.
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut routes: Vec<_> = self
            .routes
            .iter()
            .flat_map(|(method, paths)| paths.keys().map(move |path| (method.clone(), path.clone())))
            .collect();
        routes.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        routes
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes())
            .finish()
    }
}
