use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("wirerpc {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: wirerpc");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("WIRERPC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("WIRERPC_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!(
        "max_payload_default: {}",
        wirerpc_frame::DEFAULT_MAX_PAYLOAD
    );
    println!("transports: tcp, {}", if cfg!(unix) { "unix" } else { "-" });
    println!("features: channel={}, cli=true", cfg!(feature = "channel"));

    Ok(SUCCESS)
}
