//! Per-server bookkeeping for accepted connections.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::observability::metrics;

/// Sequence number of an accepted connection, unique within one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    active: AtomicU64,
}

/// Shared view of how many connections a server has accepted and still holds.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counters: Arc<Counters>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection from `peer`; it counts as active until the
    /// returned guard is dropped.
    pub fn open(&self, peer: SocketAddr) -> ConnectionGuard {
        let id = ConnectionId(self.counters.accepted.fetch_add(1, Ordering::Relaxed) + 1);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(active);
        tracing::trace!(connection_id = %id, peer_addr = %peer, active, "Connection opened");

        ConnectionGuard {
            counters: Arc::clone(&self.counters),
            id,
            peer,
            opened_at: Instant::now(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Connections accepted since the server was created.
    pub fn accepted_count(&self) -> u64 {
        self.counters.accepted.load(Ordering::Relaxed)
    }
}

/// Keeps one connection counted as active.
#[derive(Debug)]
pub struct ConnectionGuard {
    counters: Arc<Counters>,
    id: ConnectionId,
    peer: SocketAddr,
    opened_at: Instant,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.counters.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_connections(active);
        tracing::trace!(
            connection_id = %self.id,
            peer_addr = %self.peer,
            open_ms = self.opened_at.elapsed().as_millis() as u64,
            "Connection closed"
        );
    }
}
