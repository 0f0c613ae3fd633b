//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! state.rs:
//!     Unstarted → (start binds) → Serving → (shutdown or fatal accept error) → Stopped
//!
//! shutdown.rs:
//!     Shutdown::trigger → accept loop stops → connections close gracefully
//!         → start returns once the last connection has finished
//!
//! signals.rs:
//!     Ctrl+C → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - A failed bind leaves the server Unstarted so the caller can retry
//! - Stopped is terminal; a server is started at most once
//! - Shutdown is a level, not an edge: late subscribers still see it

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::ServerState;
