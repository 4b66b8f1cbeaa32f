use std::path::PathBuf;

use crate::registry::SessionId;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A device or session identifier is not a number.
    #[error("{what} not a number: {value:?}")]
    InvalidIdentifier { what: &'static str, value: String },

    /// The device port plus the configured offset leaves the port range.
    #[error("device {device} with port offset {port_diff} is outside the port range")]
    PortOutOfRange { device: u16, port_diff: u16 },

    /// An inbound datagram failed validation.
    #[error("protocol error: {0}")]
    Protocol(#[from] udplink_frame::FrameError),

    /// A receive is already outstanding on this session.
    #[error("something else already listening on session {0}")]
    AlreadyListening(SessionId),

    /// The session has no registry entry.
    #[error("session {0} does not exist")]
    UnknownSession(SessionId),

    /// The host reported an error.
    #[error("host error: {0}")]
    Host(#[from] udplink_socket::HostError),

    /// The host returned a negative result code.
    #[error("cannot {op}, error: {code}")]
    ResultCode { op: &'static str, code: i32 },

    /// The host's inbound stream already has a listener.
    #[error("inbound datagram stream already has a listener")]
    ListenerTaken,

    /// More device ports were configured than the port offset allows.
    #[error("too many ports ({count}); max {max} allowed")]
    TooManyPorts { count: usize, max: u16 },

    /// A configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The session was disconnected while a receive was waiting on it.
    #[error("session {0} disconnected while receiving")]
    Disconnected(SessionId),
}

/// Coarse classification of [`SessionError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Protocol,
    Conflict,
    NotFound,
    Resource,
    Configuration,
    Canceled,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier { .. } | Self::PortOutOfRange { .. } => ErrorKind::Validation,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::AlreadyListening(_) => ErrorKind::Conflict,
            Self::UnknownSession(_) => ErrorKind::NotFound,
            Self::Host(_) | Self::ResultCode { .. } | Self::ListenerTaken => ErrorKind::Resource,
            Self::TooManyPorts { .. } | Self::ConfigFile { .. } | Self::Json(_) => {
                ErrorKind::Configuration
            }
            Self::Disconnected(_) => ErrorKind::Canceled,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
