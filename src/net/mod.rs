//! TCP side of the server.
//!
//! `listener` binds and accepts under a connection limit; `connection`
//! numbers accepted connections and counts the ones still open.

pub mod connection;
pub mod listener;
