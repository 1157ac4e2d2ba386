use std::fs;
use std::time::Instant;

use tracing::debug;
use wirerpc_channel::{connect, DispatchTable};

use crate::cmd::{parse_duration, CallArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_reply, OutputFormat, Reply};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let body = resolve_body(&args)?;

    let conn = connect(&args.address, DispatchTable::new())
        .map_err(|err| channel_error("connect failed", err))?;

    let started = Instant::now();
    let result = conn
        .caller()
        .call_timeout(args.method.as_str(), body, timeout);
    let elapsed = started.elapsed();
    debug!(method = %args.method, elapsed_ms = elapsed.as_millis() as u64, "call finished");

    conn.shutdown();
    conn.join();

    let response = result.map_err(|err| channel_error("call failed", err))?;
    let address = args.address.to_string();
    print_reply(
        &Reply {
            address: &address,
            method: &args.method,
            body: &response,
            elapsed,
        },
        format,
    );
    Ok(SUCCESS)
}

fn resolve_body(args: &CallArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}
