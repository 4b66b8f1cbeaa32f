use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::error::{FrameError, Result};

/// Protocol marker carried in byte 0 of every datagram.
pub const MARKER: u8 = 0x3F;

/// Wire size of every encoded datagram.
pub const DATAGRAM_SIZE: usize = 64;

/// Payload bytes that fit after the marker.
pub const PAYLOAD_CAPACITY: usize = DATAGRAM_SIZE - 1;

/// Encode a payload into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌─────────────┬──────────────────────────────────────┐
/// │ Marker (1B) │ Payload (63B)                        │
/// │ 0x3F        │ zero-padded, truncated past 63 bytes │
/// └─────────────┴──────────────────────────────────────┘
/// ```
///
/// Payloads longer than [`PAYLOAD_CAPACITY`] are cut, not rejected. Callers
/// that need the whole payload on the wire must split it themselves.
pub fn encode_into(payload: &[u8], dst: &mut BytesMut) {
    let kept = payload.len().min(PAYLOAD_CAPACITY);
    if kept < payload.len() {
        debug!(
            len = payload.len(),
            kept, "payload truncated to fit a single datagram"
        );
    }
    dst.reserve(DATAGRAM_SIZE);
    dst.put_u8(MARKER);
    dst.put_slice(&payload[..kept]);
    dst.put_bytes(0, PAYLOAD_CAPACITY - kept);
}

/// Encode a payload into a fresh 64-byte datagram.
pub fn encode_datagram(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(DATAGRAM_SIZE);
    encode_into(payload, &mut buf);
    buf.freeze()
}

/// Validate a received datagram and strip the marker.
///
/// Returns every byte after the marker, padding included. The datagram is
/// not required to be exactly [`DATAGRAM_SIZE`] bytes; only the marker is
/// checked.
pub fn decode_datagram(datagram: Bytes) -> Result<Bytes> {
    match datagram.first() {
        None => Err(FrameError::Empty),
        Some(&MARKER) => Ok(datagram.slice(1..)),
        Some(&found) => Err(FrameError::InvalidMarker { found }),
    }
}

/// Codec for `tokio_util::udp::UdpFramed`.
///
/// Each read buffer handed to the decoder holds exactly one datagram, so the
/// decoder consumes it whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatagramCodec;

impl Decoder for DatagramCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if src.is_empty() {
            return Ok(None);
        }
        decode_datagram(src.split().freeze()).map(Some)
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for DatagramCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: T, dst: &mut BytesMut) -> Result<()> {
        encode_into(payload.as_ref(), dst);
        Ok(())
    }
}
