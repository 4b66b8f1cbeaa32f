use udplink_frame::{DATAGRAM_SIZE, MARKER};

use crate::cmd::{VersionArgs, DEFAULT_PORT_DIFF};
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("udplink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: udplink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("UDPLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("datagram_size: {DATAGRAM_SIZE}");
    println!("marker: {MARKER:#04x}");
    println!("default_port_diff: {DEFAULT_PORT_DIFF}");

    Ok(SUCCESS)
}
