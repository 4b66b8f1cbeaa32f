/// Errors that can occur while unframing a datagram.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The first byte of the datagram is not the protocol marker.
    #[error("invalid data; first byte should be 0x3f, is {found:#04x}")]
    InvalidMarker { found: u8 },

    /// The datagram carries no bytes at all, not even a marker.
    #[error("empty datagram (missing 0x3f marker)")]
    Empty,

    /// An I/O error occurred on a framed socket.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
