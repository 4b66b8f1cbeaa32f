use std::fs;
use std::time::Duration;

use tracing::warn;
use udplink_frame::PAYLOAD_CAPACITY;
use udplink_session::Transport;
use udplink_socket::{DatagramHost, UdpHost};

use crate::cmd::{SendArgs, Settings};
use crate::exit::{io_error, session_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_payload, OutputFormat};

pub async fn run(args: SendArgs, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;
    if payload.len() > PAYLOAD_CAPACITY {
        warn!(
            size = payload.len(),
            max = PAYLOAD_CAPACITY,
            "payload will be truncated"
        );
    }

    let config = settings.transport_config()?;
    let transport = Transport::start(UdpHost::new(), config)
        .map_err(|err| session_error("setup failed", err))?;
    let session = transport
        .connect(&args.device)
        .await
        .map_err(|err| session_error("connect failed", err))?;

    let wait = args.wait.then_some(wait_timeout);
    let result = exchange(&transport, &args.device, &session, &payload, wait, format).await;

    if let Err(err) = transport.disconnect(&args.device, &session).await {
        warn!(session = %session, error = %err, "disconnect failed");
    }
    result.map(|()| SUCCESS)
}

async fn exchange<H: DatagramHost>(
    transport: &Transport<H>,
    device: &str,
    session: &str,
    payload: &[u8],
    wait: Option<Duration>,
    format: OutputFormat,
) -> CliResult<()> {
    // Claim the reply slot first so a fast device cannot race the receive.
    let reply = wait.map(|timeout| (timeout, transport.receive(device, session)));

    transport
        .send(device, session, payload)
        .await
        .map_err(|err| session_error("send failed", err))?;

    if let Some((timeout, reply)) = reply {
        let reply = tokio::time::timeout(timeout, reply)
            .await
            .map_err(|_| CliError::new(TIMEOUT, format!("no reply within {timeout:?}")))?
            .map_err(|err| session_error("receive failed", err))?;
        print_payload(&reply, device, session, format);
    }
    Ok(())
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input.split_whitespace().collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);

    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            "--hex must have an even number of digits",
        ));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("--hex is not valid hex: {input}")))
        })
        .collect()
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use udplink_session::TransportConfig;
    use udplink_socket::MemoryHost;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_hex_accepts_common_spellings() {
        assert_eq!(parse_hex("3f00ab").unwrap(), vec![0x3F, 0x00, 0xAB]);
        assert_eq!(parse_hex("0x3F 00").unwrap(), vec![0x3F, 0x00]);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert_eq!(parse_hex("abc").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("é1").unwrap_err().code, USAGE);
    }

    #[tokio::test]
    async fn exchange_times_out_without_reply() {
        let transport =
            Transport::start(MemoryHost::new(), TransportConfig::new(3)).expect("transport");
        let session = transport.connect("21324").await.unwrap();

        let err = exchange(
            &transport,
            "21324",
            &session,
            b"ping",
            Some(Duration::from_millis(50)),
            OutputFormat::Json,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, TIMEOUT);
        assert_eq!(transport.host().sent().len(), 1);
    }

    #[tokio::test]
    async fn exchange_receives_reply() {
        let transport =
            Transport::start(MemoryHost::new(), TransportConfig::new(3)).expect("transport");
        let session = transport.connect("21324").await.unwrap();

        // Device side: echo whatever the session sends once it shows up.
        let host = transport.host();
        let device = host.create().await.unwrap();
        host.bind(device, IpAddr::V4(Ipv4Addr::LOCALHOST), 21324)
            .await
            .unwrap();

        let echo = async {
            loop {
                if let Some(request) = host.sent().into_iter().find(|s| s.from != device) {
                    let to = host.bound_addr(request.from).unwrap();
                    host.send(device, request.data, to).await.unwrap();
                    break;
                }
                tokio::task::yield_now().await;
            }
        };

        let (result, ()) = tokio::join!(
            exchange(
                &transport,
                "21324",
                &session,
                b"ping",
                Some(Duration::from_secs(2)),
                OutputFormat::Raw,
            ),
            echo
        );
        result.unwrap();
    }
}
