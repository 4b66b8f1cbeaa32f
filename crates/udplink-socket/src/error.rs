use std::net::SocketAddr;

use crate::traits::SocketId;

/// Errors reported by a datagram host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Failed to bind a socket to the requested address.
    #[error("failed to bind socket {id} to {addr}: {source}")]
    Bind {
        id: SocketId,
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to transmit a datagram.
    #[error("failed to send on socket {id} to {addr}: {source}")]
    Send {
        id: SocketId,
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The socket id was never created or has already been closed.
    #[error("socket {0} does not exist")]
    UnknownSocket(SocketId),

    /// The socket exists but has not been bound yet.
    #[error("socket {0} is not bound")]
    NotBound(SocketId),

    /// The socket id space is exhausted.
    #[error("no socket ids left")]
    Exhausted,

    /// The host rejected the call without an I/O error to report.
    #[error("host rejected call: {0}")]
    Rejected(String),

    /// An I/O error occurred on the host.
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HostError>;
