//! Session-oriented UDP transport for locally emulated devices.
//!
//! udplink talks to devices that listen on numbered loopback UDP ports.
//! Every session owns its own local socket, every datagram is a fixed
//! 64-byte frame, and replies are matched back to sessions by the socket
//! they arrive on.
//!
//! # Crate Structure
//!
//! - [`socket`]: host UDP socket primitive (real and in-memory hosts)
//! - [`frame`]: fixed-size marker-prefixed datagram framing
//! - [`session`]: session registry, receive multiplexing and the transport

/// Re-export socket types.
pub mod socket {
    pub use udplink_socket::*;
}

/// Re-export frame types.
pub mod frame {
    pub use udplink_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use udplink_session::*;
}

pub use udplink_session::{Transport, TransportConfig};
