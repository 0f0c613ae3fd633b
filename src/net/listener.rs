//! Bounded TCP accept.
//!
//! Each accepted connection holds a semaphore permit, so at most
//! `listener.max_connections` are served at once; further accepts wait.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

impl ListenerError {
    /// Whether the accept loop should keep going after this error.
    ///
    /// Per-connection failures and file descriptor exhaustion clear up on
    /// their own; anything else means the listening socket is unusable.
    pub fn is_transient(&self) -> bool {
        match self {
            ListenerError::Bind { .. } => false,
            ListenerError::Accept(e) => {
                matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionRefused
                        | io::ErrorKind::Interrupted
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                ) || matches!(e.raw_os_error(), Some(EMFILE) | Some(ENFILE))
            }
        }
    }
}

const ENFILE: i32 = 23;
const EMFILE: i32 = 24;

/// Expand the `:port` shorthand to all interfaces.
pub fn normalize_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{}", address)
    } else {
        address.to_string()
    }
}

/// TCP listener paired with a connection-slot semaphore.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to `address` (`host:port` or `:port`).
    pub async fn bind(address: &str, max_connections: usize) -> Result<Self, ListenerError> {
        let address = normalize_address(address);
        let bind_err = |source| ListenerError::Bind {
            address: address.clone(),
            source,
        };

        let listener = TcpListener::bind(address.as_str()).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Wait for a free slot, then for the next connection.
    ///
    /// The permit must live as long as the connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Accept(io::Error::other("connection limiter closed")))?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, io::Error> {
        self.inner.local_addr()
    }

    /// Slots left before accepts start waiting.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// One connection slot; dropping it frees the slot.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
