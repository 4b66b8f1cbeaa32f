use std::fmt;
use std::io;

use udplink_frame::FrameError;
use udplink_session::{ErrorKind, SessionError};
use udplink_socket::HostError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        io::ErrorKind::NotFound => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn host_error(context: &str, err: HostError) -> CliError {
    match err {
        HostError::Io(source) => io_error(context, source),
        HostError::Bind { ref source, .. } | HostError::Send { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Host(err) => host_error(context, err),
        SessionError::Protocol(err) => frame_error(context, err),
        other => {
            let code = match other.kind() {
                ErrorKind::Validation | ErrorKind::Configuration => USAGE,
                ErrorKind::Protocol => DATA_INVALID,
                ErrorKind::Resource => TRANSPORT_ERROR,
                ErrorKind::Conflict | ErrorKind::NotFound | ErrorKind::Canceled => FAILURE,
            };
            CliError::new(code, format!("{context}: {other}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use udplink_session::SessionId;

    use super::*;

    #[test]
    fn session_errors_map_by_kind() {
        let err = session_error(
            "connect failed",
            SessionError::InvalidIdentifier {
                what: "device",
                value: "x".into(),
            },
        );
        assert_eq!(err.code, USAGE);
        assert_eq!(err.message, "connect failed: device not a number: \"x\"");

        let err = session_error("c", SessionError::TooManyPorts { count: 4, max: 3 });
        assert_eq!(err.code, USAGE);

        let err = session_error("c", SessionError::ResultCode { op: "send", code: -1 });
        assert_eq!(err.code, TRANSPORT_ERROR);

        let err = session_error("c", SessionError::Disconnected(SessionId::new(1)));
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn protocol_errors_are_invalid_data() {
        let err = session_error(
            "receive failed",
            SessionError::Protocol(FrameError::InvalidMarker { found: 0 }),
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn host_bind_conflict_is_transport_error() {
        let err = session_error(
            "connect failed",
            SessionError::Host(HostError::Bind {
                id: SessionId::new(1),
                addr: "127.0.0.1:1".parse().unwrap(),
                source: io::Error::from(io::ErrorKind::AddrInUse),
            }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn io_error_codes() {
        assert_eq!(
            io_error("x", io::Error::from(io::ErrorKind::PermissionDenied)).code,
            PERMISSION_DENIED
        );
        assert_eq!(
            io_error("x", io::Error::from(io::ErrorKind::NotFound)).code,
            USAGE
        );
    }
}
