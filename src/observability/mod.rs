//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events and spans)
//!     → metrics.rs (counters, gauges, histograms)
//! ```
//!
//! # Design Decisions
//! - Every request runs inside a span carrying its request ID
//! - Metrics go through the `metrics` facade; without an installed
//!   recorder the calls are no-ops

pub mod logging;
pub mod metrics;
