//! Request and connection metrics.
//!
//! - `web_requests_total` (counter): requests by method, status
//! - `web_request_duration_seconds` (histogram): dispatch latency
//! - `web_active_connections` (gauge): connections currently served

use std::time::Instant;

/// Record a dispatched request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let elapsed = start.elapsed().as_secs_f64();
    let method = method.to_string();
    let status = status.to_string();

    ::metrics::counter!("web_requests_total", "method" => method.clone(), "status" => status)
        .increment(1);
    ::metrics::histogram!("web_request_duration_seconds", "method" => method).record(elapsed);
}

pub fn set_active_connections(count: u64) {
    ::metrics::gauge!("web_active_connections").set(count as f64);
}
