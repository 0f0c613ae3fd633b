//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → owned by HttpServer, read by listener, dispatch and logging
//! ```
//!
//! # Design Decisions
//! - Every field has a default so an empty file is a valid config
//! - Validation separates syntactic (serde) from semantic checks
//! - `start(address)` takes the address explicitly; `listener.bind_address`
//!   is only the default used by the binary

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{LimitsConfig, ListenerConfig, ObservabilityConfig, ServerConfig, TimeoutConfig};
