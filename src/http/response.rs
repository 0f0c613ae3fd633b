//! Canned responses produced by the server itself.

use axum::http::StatusCode;

use crate::http::context::Context;

pub const NOT_FOUND_BODY: &str = "404 page not found";
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";
pub const REQUEST_TIMEOUT_BODY: &str = "Request Timeout";

/// Answer a request that matched no route.
pub fn not_found(ctx: &mut Context) {
    ctx.response().reset();
    ctx.text(StatusCode::NOT_FOUND, NOT_FOUND_BODY);
}

/// Replace whatever a failed handler wrote with a plain 500.
pub fn internal_error(ctx: &mut Context) {
    ctx.response().reset();
    ctx.text(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY);
}

/// Replace a partial response with a 408 after the chain ran out of time.
pub fn request_timeout(ctx: &mut Context) {
    ctx.response().reset();
    ctx.text(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT_BODY);
}
