use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use udplink_session::Device;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PayloadOutput<'a> {
    device: &'a str,
    session: &'a str,
    payload_size: usize,
    payload: String,
    hex: String,
    timestamp: String,
}

#[derive(Serialize)]
struct DevicesOutput<'a> {
    port_diff: u16,
    devices: &'a [Device],
}

pub fn print_payload(payload: &[u8], device: &str, session: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PayloadOutput {
                device,
                session,
                payload_size: payload.len(),
                payload: payload_preview(payload),
                hex: to_hex(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "SESSION", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    device.to_string(),
                    session.to_string(),
                    payload.len().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "device={} session={} size={} payload={}",
                device,
                session,
                payload.len(),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_devices(devices: &[Device], port_diff: u16, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DevicesOutput { port_diff, devices };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "LOCAL PORT"]);
            for device in devices {
                table.add_row(vec![device.path.clone(), local_port(device, port_diff)]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for device in devices {
                println!(
                    "device={} local_port={}",
                    device.path,
                    local_port(device, port_diff)
                );
            }
        }
        OutputFormat::Raw => {
            for device in devices {
                println!("{}", device.path);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn local_port(device: &Device, port_diff: u16) -> String {
    device
        .path
        .parse::<u16>()
        .ok()
        .and_then(|port| port.checked_add(port_diff))
        .map_or_else(|| "-".to_string(), |port| port.to_string())
}

/// Text view of a payload with the zero padding stripped.
fn payload_preview(payload: &[u8]) -> String {
    let end = payload
        .iter()
        .rposition(|b| *b != 0)
        .map_or(0, |last| last + 1);
    match std::str::from_utf8(&payload[..end]) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
