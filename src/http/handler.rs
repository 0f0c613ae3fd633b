//! Request handlers.
//!
//! A handler borrows the [`Context`] for the duration of one call and
//! communicates only by writing to its response; there is no return value.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::context::Context;

/// A unit of request-handling behaviour.
///
/// Implemented for every `Fn(&mut Context) -> BoxFuture<'_, ()>` closure, so
/// most callers never name this trait. Implement it directly for handlers
/// that carry their own state.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, ()> {
        self(ctx)
    }
}

/// Shared, type-erased handler as stored in the route table.
pub type HandleFunc = Arc<dyn Handler>;

/// Wrap a closure as a [`HandleFunc`].
///
/// ```ignore
/// let pong = handle_fn(|ctx| Box::pin(async move {
///     ctx.text(StatusCode::OK, "pong");
/// }));
/// ```
pub fn handle_fn<F>(f: F) -> HandleFunc
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a [`Handler`] implementation as a [`HandleFunc`].
pub fn handler<H: Handler>(handler: H) -> HandleFunc {
    Arc::new(handler)
}
