use tracing::{info, warn};
use udplink_session::{SessionError, Transport};
use udplink_socket::UdpHost;

use crate::cmd::{ListenArgs, Settings};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_payload, OutputFormat};

pub async fn run(args: ListenArgs, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    let config = settings.transport_config()?;
    let transport = Transport::start(UdpHost::new(), config)
        .map_err(|err| session_error("setup failed", err))?;
    let session = transport
        .connect(&args.device)
        .await
        .map_err(|err| session_error("connect failed", err))?;
    info!(device = %args.device, session = %session, "listening");

    let mut printed = 0usize;
    let result = loop {
        if args.count.is_some_and(|count| printed >= count) {
            break Ok(SUCCESS);
        }

        let next = transport.receive(&args.device, &session);
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(SUCCESS),
            received = next => match received {
                Ok(payload) => {
                    print_payload(&payload, &args.device, &session, format);
                    printed = printed.saturating_add(1);
                }
                Err(err @ SessionError::Protocol(_)) => {
                    warn!(error = %err, "skipping malformed datagram");
                }
                Err(err) => break Err(session_error("receive failed", err)),
            },
        }
    };

    if let Err(err) = transport.disconnect(&args.device, &session).await {
        warn!(session = %session, error = %err, "disconnect failed");
    }
    result
}
