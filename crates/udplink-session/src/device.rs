use serde::Serialize;

use crate::error::{Result, SessionError};
use crate::registry::SessionId;

/// An enumerated device. The path is the device's logical port in decimal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub path: String,
}

impl Device {
    pub fn from_port(port: u16) -> Self {
        Self {
            path: port.to_string(),
        }
    }
}

/// Parse a device identifier into its logical port.
pub fn parse_device(device: &str) -> Result<u16> {
    device
        .trim()
        .parse()
        .map_err(|_| SessionError::InvalidIdentifier {
            what: "device",
            value: device.to_string(),
        })
}

/// Parse a session identifier.
pub fn parse_session(session: &str) -> Result<SessionId> {
    session.parse().map_err(|_| SessionError::InvalidIdentifier {
        what: "session",
        value: session.to_string(),
    })
}
