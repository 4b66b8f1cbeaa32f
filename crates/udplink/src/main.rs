mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::{Command, Settings};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "udplink", version, about = "Session-oriented UDP device transport CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). RUST_LOG takes precedence when set.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// JSON transport configuration file.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Offset between a device port and the local port its session binds.
    #[arg(long, value_name = "N", env = "UDPLINK_PORT_DIFF", global = true)]
    port_diff: Option<u16>,

    /// Device ports to enumerate (comma-separated).
    #[arg(
        long,
        value_name = "PORTS",
        value_delimiter = ',',
        env = "UDPLINK_PORTS",
        global = true
    )]
    ports: Option<Vec<u16>>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let settings = Settings {
        config: cli.config,
        port_diff: cli.port_diff,
        ports: cli.ports,
    };
    let result = cmd::run(cli.command, settings, format).await;

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
