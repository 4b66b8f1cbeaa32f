use std::net::Ipv4Addr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Loopback address sessions bind to and send to by default.
pub const DEFAULT_ADDRESS: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// What `disconnect` does with a session's receive state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    /// Drop buffered datagrams and cancel a waiting receive.
    #[default]
    Purge,
    /// Leave buffered datagrams and a waiting receive in place; the buffer
    /// can still be drained after the session is gone.
    Preserve,
}

/// Transport configuration.
///
/// ```json
/// { "port_diff": 3, "ports": [21324], "on_disconnect": "purge" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Offset between a device's logical port and the local port a session
    /// for it binds to.
    pub port_diff: u16,
    /// Address sessions bind to and peers are reached at.
    #[serde(default = "default_address")]
    pub address: Ipv4Addr,
    /// Logical device ports reported by `enumerate`.
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub on_disconnect: DisconnectPolicy,
}

fn default_address() -> Ipv4Addr {
    DEFAULT_ADDRESS
}

impl TransportConfig {
    pub fn new(port_diff: u16) -> Self {
        Self {
            port_diff,
            address: DEFAULT_ADDRESS,
            ports: Vec::new(),
            on_disconnect: DisconnectPolicy::default(),
        }
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_address(mut self, address: Ipv4Addr) -> Self {
        self.address = address;
        self
    }

    pub fn with_disconnect_policy(mut self, policy: DisconnectPolicy) -> Self {
        self.on_disconnect = policy;
        self
    }

    /// Check the port list against the port offset.
    ///
    /// Each configured device gets its own local port at `port + port_diff`;
    /// more devices than the offset would let two devices' local ports
    /// collide with each other's logical ports.
    pub fn validate(&self) -> Result<()> {
        check_port_count(self.ports.len(), self.port_diff)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SessionError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}

pub(crate) fn check_port_count(count: usize, port_diff: u16) -> Result<()> {
    if count > usize::from(port_diff) {
        return Err(SessionError::TooManyPorts {
            count,
            max: port_diff,
        });
    }
    Ok(())
}
