use udplink_session::Transport;
use udplink_socket::UdpHost;

use crate::cmd::{DevicesArgs, Settings};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_devices, OutputFormat};

pub fn run(_args: DevicesArgs, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    let config = settings.transport_config()?;
    let transport =
        Transport::new(UdpHost::new(), config).map_err(|err| session_error("setup failed", err))?;

    print_devices(&transport.enumerate(), transport.port_diff(), format);
    Ok(SUCCESS)
}
