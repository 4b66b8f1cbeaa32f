use std::path::PathBuf;

use clap::{Args, Subcommand};
use udplink_session::TransportConfig;

use crate::exit::{session_error, CliResult};
use crate::output::OutputFormat;

pub mod devices;
pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

/// Port offset used when neither a config file nor `--port-diff` sets one.
pub const DEFAULT_PORT_DIFF: u16 = 3;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List configured devices.
    Devices(DevicesArgs),
    /// Send a single payload to a device.
    Send(SendArgs),
    /// Open a session and print received payloads.
    Listen(ListenArgs),
    /// Emulate a device that echoes every frame back.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Transport settings gathered from global flags.
#[derive(Debug, Default)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub port_diff: Option<u16>,
    pub ports: Option<Vec<u16>>,
}

impl Settings {
    /// Load the config file if one was given, then apply flag overrides.
    pub fn transport_config(&self) -> CliResult<TransportConfig> {
        let mut config = match &self.config {
            Some(path) => TransportConfig::from_json_file(path)
                .map_err(|err| session_error("config load failed", err))?,
            None => TransportConfig::new(DEFAULT_PORT_DIFF),
        };
        if let Some(port_diff) = self.port_diff {
            config.port_diff = port_diff;
        }
        if let Some(ports) = &self.ports {
            config.ports = ports.clone();
        }
        config
            .validate()
            .map_err(|err| session_error("invalid configuration", err))?;
        Ok(config)
    }
}

pub async fn run(command: Command, settings: Settings, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Devices(args) => devices::run(args, &settings, format),
        Command::Send(args) => send::run(args, &settings, format).await,
        Command::Listen(args) => listen::run(args, &settings, format).await,
        Command::Echo(args) => echo::run(args, &settings).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct DevicesArgs {}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Device port to send to.
    pub device: String,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Wait for one reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Device port to open a session for.
    pub device: String,
    /// Exit after receiving N payloads.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Device port to bind.
    pub port: u16,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn flags_override_defaults() {
        let settings = Settings {
            port_diff: Some(5),
            ports: Some(vec![1, 2]),
            ..Settings::default()
        };
        let config = settings.transport_config().unwrap();
        assert_eq!(config.port_diff, 5);
        assert_eq!(config.ports, vec![1, 2]);
    }

    #[test]
    fn default_port_diff_applies() {
        let config = Settings::default().transport_config().unwrap();
        assert_eq!(config.port_diff, DEFAULT_PORT_DIFF);
        assert!(config.ports.is_empty());
    }

    #[test]
    fn too_many_ports_is_usage_error() {
        let settings = Settings {
            port_diff: Some(1),
            ports: Some(vec![1, 2]),
            ..Settings::default()
        };
        let err = settings.transport_config().unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn missing_config_file_is_usage_error() {
        let settings = Settings {
            config: Some(PathBuf::from("/nonexistent/udplink.json")),
            ..Settings::default()
        };
        let err = settings.transport_config().unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("config load failed"));
    }
}
