use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::UdpSocket;
use tokio_util::udp::UdpFramed;
use tracing::{info, warn};
use udplink_frame::{DatagramCodec, FrameError};

use crate::cmd::{EchoArgs, Settings};
use crate::exit::{io_error, CliResult, SUCCESS};

/// Play a device on `port`: every valid frame is sent back to its sender.
pub async fn run(args: EchoArgs, settings: &Settings) -> CliResult<i32> {
    let config = settings.transport_config()?;
    let addr = SocketAddr::from((config.address, args.port));
    let socket = UdpSocket::bind(addr)
        .await
        .map_err(|err| io_error(&format!("bind {addr} failed"), err))?;
    info!(%addr, "echo device ready");

    let mut framed = UdpFramed::new(socket, DatagramCodec);
    loop {
        let next = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = framed.next() => next,
        };

        match next {
            Some(Ok((payload, from))) => {
                info!(%from, size = payload.len(), "echoing frame");
                if let Err(err) = framed.send((payload, from)).await {
                    warn!(%from, error = %err, "failed sending echo");
                }
            }
            Some(Err(FrameError::Io(err))) => {
                return Err(io_error("receive failed", err));
            }
            Some(Err(err)) => warn!(error = %err, "dropping invalid datagram"),
            None => break,
        }
    }

    Ok(SUCCESS)
}
