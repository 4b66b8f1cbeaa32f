//! Fixed-size datagram framing for udplink.
//!
//! Every datagram on the wire is exactly [`DATAGRAM_SIZE`] bytes:
//! - a 1-byte protocol marker (`0x3F`) for validation
//! - up to 63 payload bytes, zero-padded
//!
//! There is no length field: a frame carries one datagram, nothing more.

pub mod codec;
pub mod error;

pub use codec::{
    decode_datagram, encode_datagram, encode_into, DatagramCodec, DATAGRAM_SIZE, MARKER,
    PAYLOAD_CAPACITY,
};
pub use error::{FrameError, Result};
