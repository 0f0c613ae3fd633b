//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (add_route / add_routes):
//!     validate path
//!     → copy current RouteTable, insert (method, path) → chain
//!     → atomically publish the new snapshot
//!
//! Dispatch:
//!     load current snapshot (lock-free)
//!     → exact lookup by method, then path
//!     → handler chain or RouteNotFound
//! ```
//!
//! # Design Decisions
//! - Exact matching only: no prefixes, parameters or trailing-slash folding
//! - Snapshots are immutable; readers never wait on writers
//! - Writers are serialised so concurrent registrations cannot lose updates
//! - Duplicate (method, path) registrations are rejected

pub mod router;
pub mod table;

pub use router::Router;
pub use table::{validate_path, HandlerChain, RouteTable};
