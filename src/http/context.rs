//! Per-request context handed to handlers.
//!
//! A [`Context`] is built by the dispatch entry point for exactly one
//! request/response exchange and consumed when the response is produced.
//! Handlers get `&mut Context`, so they cannot keep it past their call.

use std::io;
use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::{
    header, request, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{WebError, WebResult};
use crate::http::request::{RequestId, X_REQUEST_ID};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// Remote address of the connection a request arrived on.
///
/// Inserted into request extensions by the accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

enum RequestBody {
    Pending(Body),
    Buffered(Bytes),
    Failed(String),
}

pub struct Context {
    request_id: RequestId,
    parts: request::Parts,
    body: RequestBody,
    max_body_size: usize,
    response: ResponseWriter,
}

impl Context {
    /// Build the context for one inbound request.
    pub fn new(request: Request<Body>, max_body_size: usize) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            request_id: RequestId::from_headers(&parts.headers),
            parts,
            body: RequestBody::Pending(body),
            max_body_size,
            response: ResponseWriter::new(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Request path without the query string.
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Header value as a string, if present and visible ASCII.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First value of a query parameter, with percent-escapes and `+` decoded.
    pub fn query(&self, key: &str) -> Option<String> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(self.parts.uri.query()?).ok()?;
        pairs.into_iter().find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Deserialize the whole query string into `T`.
    ///
    /// A request without a query string is treated as an empty one.
    pub fn query_as<T: DeserializeOwned>(&self) -> WebResult<T> {
        let query = self.parts.uri.query().unwrap_or_default();
        Ok(serde_urlencoded::from_str(query)?)
    }

    /// Declared `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.header(header::CONTENT_LENGTH)?.trim().parse().ok()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.parts.extensions.get::<PeerAddr>().map(|p| p.0)
    }

    /// Read the whole request body.
    ///
    /// The first call buffers it (up to the configured limit); later calls
    /// return the same bytes, so every handler in a chain can read it. A
    /// declared `Content-Length` over the limit fails without reading.
    pub async fn body(&mut self) -> WebResult<Bytes> {
        if let Some(length) = self.content_length() {
            if length > self.max_body_size as u64 {
                return Err(WebError::BodyTooLarge {
                    length,
                    limit: self.max_body_size,
                });
            }
        }

        let body = match std::mem::replace(&mut self.body, RequestBody::Buffered(Bytes::new())) {
            RequestBody::Pending(body) => body,
            RequestBody::Buffered(bytes) => {
                self.body = RequestBody::Buffered(bytes.clone());
                return Ok(bytes);
            }
            RequestBody::Failed(reason) => {
                self.body = RequestBody::Failed(reason.clone());
                return Err(WebError::Body(reason));
            }
        };

        match axum::body::to_bytes(body, self.max_body_size).await {
            Ok(bytes) => {
                self.body = RequestBody::Buffered(bytes.clone());
                Ok(bytes)
            }
            Err(e) => {
                let reason = e.to_string();
                self.body = RequestBody::Failed(reason.clone());
                Err(WebError::Body(reason))
            }
        }
    }

    /// Read the request body as UTF-8 text.
    pub async fn body_string(&mut self) -> WebResult<String> {
        let bytes = self.body().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| WebError::Body(e.to_string()))
    }

    /// The response sink for this exchange.
    pub fn response(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    /// Write a plain-text response body with `status`.
    pub fn text(&mut self, status: StatusCode, body: impl AsRef<str>) {
        let response = &mut self.response;
        response.set_status(status);
        response.set_content_type(TEXT_PLAIN);
        response.write_bytes(body.as_ref().as_bytes());
    }

    /// Serialize `value` as the JSON response body with `status`.
    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> WebResult<()> {
        let encoded = serde_json::to_vec(value)?;
        let response = &mut self.response;
        response.set_status(status);
        response.set_content_type(APPLICATION_JSON);
        response.write_bytes(&encoded);
        Ok(())
    }

    /// Turn the written response into the transport response.
    pub fn into_response(self) -> Response<Body> {
        let ResponseWriter {
            status,
            headers,
            body,
        } = self.response;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        if let Some(id) = self.request_id.to_header_value() {
            response.headers_mut().insert(X_REQUEST_ID, id);
        }
        response
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("method", self.method())
            .field("uri", self.uri())
            .field("status", &self.response.status)
            .finish_non_exhaustive()
    }
}

/// Outbound half of a [`Context`]: status, headers and body.
///
/// Implements [`io::Write`], so `write!` appends to the body.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseWriter {
    fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing earlier values with the same name.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Append to the body.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Drop everything written so far and go back to an empty 200.
    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
    }

    fn set_content_type(&mut self, value: &'static str) {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
