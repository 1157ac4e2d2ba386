mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wirerpc", version, about = "Bidirectional RPC over framed byte streams")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::ServeArgs;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "wirerpc",
            "call",
            "unix:/tmp/test.sock",
            "getItem",
            "--data",
            "A",
            "--timeout",
            "500ms",
        ])
        .expect("call args should parse");

        match cli.command {
            Command::Call(args) => {
                assert_eq!(args.method, "getItem");
                assert_eq!(args.data.as_deref(), Some("A"));
                assert!(matches!(
                    args.address,
                    wirerpc_transport::Address::Unix(_)
                ));
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_body_args() {
        let err = Cli::try_parse_from([
            "wirerpc",
            "call",
            "127.0.0.1:7700",
            "echo",
            "--data",
            "hello",
            "--file",
            "/tmp/body.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_malformed_address() {
        let err = Cli::try_parse_from(["wirerpc", "serve", "localhost"])
            .expect_err("address without port should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_serve_with_count() {
        let cli = Cli::try_parse_from(["wirerpc", "serve", "127.0.0.1:0", "--count", "2"])
            .expect("serve args should parse");
        assert!(matches!(cli.command, Command::Serve(ServeArgs { count: Some(2), .. })));
    }
}
