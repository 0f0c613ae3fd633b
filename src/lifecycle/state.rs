//! Server lifecycle states.

use std::fmt;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Created; routes may be registered, nothing is listening.
    Unstarted,
    /// The accept loop is running on `local_addr`.
    Serving { local_addr: SocketAddr },
    /// The accept loop has ended. Terminal.
    Stopped,
}

impl ServerState {
    pub fn is_serving(&self) -> bool {
        matches!(self, ServerState::Serving { .. })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            ServerState::Serving { local_addr } => Some(*local_addr),
            _ => None,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Unstarted => write!(f, "unstarted"),
            ServerState::Serving { local_addr } => write!(f, "serving on {}", local_addr),
            ServerState::Stopped => write!(f, "stopped"),
        }
    }
}
