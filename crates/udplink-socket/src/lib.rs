//! Host UDP socket primitive.
//!
//! This is the lowest layer of udplink. It exposes the narrow contract the
//! session layer needs from a datagram host:
//! - create / bind / send / close on numbered sockets
//! - a single inbound event stream delivering `(socket, datagram)` pairs
//!
//! Two hosts are provided: [`UdpHost`] over real tokio UDP sockets, and
//! [`MemoryHost`], a simulated loopback network with fault injection.

pub mod error;
pub mod memory;
pub mod traits;
pub mod udp;

pub use error::{HostError, Result};
pub use memory::{Fault, HostOp, MemoryHost, Sent};
pub use traits::{DatagramHost, Inbound, SocketId};
pub use udp::UdpHost;
