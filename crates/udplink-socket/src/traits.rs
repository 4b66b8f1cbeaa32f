use std::fmt;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::num::ParseIntError;
use std::str::FromStr;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::Result;

/// Host-assigned socket identifier.
///
/// Stable for the lifetime of the underlying socket. Rendered as a plain
/// decimal number so it can travel through string-typed APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u32);

impl SocketId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SocketId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A datagram delivered by the host to the inbound event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// The local socket the datagram arrived on.
    pub socket: SocketId,
    /// Raw datagram bytes, exactly as received.
    pub data: Bytes,
}

/// The host socket primitive.
///
/// Result codes follow the host convention: a negative code is a failure the
/// host chose not to describe further, anything else is success. Errors the
/// host can describe come back as [`HostError`](crate::HostError).
pub trait DatagramHost: Send + Sync + 'static {
    /// Allocate a new, unbound socket.
    fn create(&self) -> impl Future<Output = Result<SocketId>> + Send;

    /// Bind a socket to a local address.
    fn bind(&self, id: SocketId, ip: IpAddr, port: u16)
        -> impl Future<Output = Result<i32>> + Send;

    /// Transmit one datagram from `id` to `to`.
    fn send(&self, id: SocketId, data: Bytes, to: SocketAddr)
        -> impl Future<Output = Result<i32>> + Send;

    /// Close a socket and stop delivering its datagrams.
    fn close(&self, id: SocketId) -> impl Future<Output = Result<()>> + Send;

    /// Take the inbound event stream.
    ///
    /// There is exactly one listener per host: the first call returns the
    /// receiver, every later call returns `None`.
    fn subscribe(&self) -> Option<UnboundedReceiver<Inbound>>;
}
