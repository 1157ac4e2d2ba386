use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};
use wirerpc_channel::{Connection, ConnectionConfig, ConnectionListener, DispatchTable};
use wirerpc_transport::{Address, RpcStream};

use crate::cmd::ServeArgs;
use crate::exit::{channel_error, CliError, CliResult, SUCCESS};
use crate::output::{print_listening, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = ConnectionConfig {
        thread_name: "wirerpc-conn".to_string(),
        ..ConnectionConfig::default()
    };
    if let Some(max) = args.max_payload {
        config.frame.max_payload_size = max;
    }

    let listener = ConnectionListener::bind(&args.address, builtin_methods())
        .map_err(|err| channel_error("bind failed", err))?
        .with_config(config);
    let bound = listener
        .local_address()
        .map_err(|err| channel_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), bound.clone())?;

    print_listening(&bound.to_string(), &listener.dispatch().methods(), format);
    info!(address = %bound, "serving");

    let mut connections: Vec<Connection> = Vec::new();
    let mut served = 0usize;
    while running.load(Ordering::SeqCst) && args.count.map_or(true, |max| served < max) {
        let conn = listener
            .accept()
            .map_err(|err| channel_error("accept failed", err))?;
        if !running.load(Ordering::SeqCst) {
            // Wake-up connection from the interrupt handler.
            break;
        }
        served += 1;
        connections.retain(|conn| !conn.is_finished());
        connections.push(conn);
    }

    let interrupted = !running.load(Ordering::SeqCst);
    for conn in connections {
        if interrupted {
            conn.shutdown();
        }
        conn.join();
    }

    info!(served, interrupted, "server stopped");
    Ok(SUCCESS)
}

/// Methods answered by `wirerpc serve`.
pub fn builtin_methods() -> DispatchTable {
    let mut table = DispatchTable::new();
    table
        .register_fn("echo", |body: Bytes| {
            debug!(size = body.len(), "echo");
            Ok::<_, String>(body)
        })
        .register_fn("ping", |_body: Bytes| {
            Ok::<_, String>(Bytes::from_static(b"pong"))
        })
        .register_fn("fail", |body: Bytes| {
            Err::<Bytes, _>(String::from_utf8_lossy(&body).into_owned())
        });
    table
}

fn install_ctrlc_handler(running: Arc<AtomicBool>, wake: Address) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        // Unblock the accept loop.
        let _ = RpcStream::connect(&wake);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(all(test, unix))]
mod tests {
    use wirerpc_channel::ChannelError;

    use super::*;

    fn serve_pair() -> (Connection, Connection) {
        let (a, b) = RpcStream::pair().expect("pair should open");
        let server = Connection::spawn(a, builtin_methods()).expect("server should start");
        let client = Connection::spawn(b, DispatchTable::new()).expect("client should start");
        (server, client)
    }

    #[test]
    fn builtin_method_names() {
        assert_eq!(builtin_methods().methods(), vec!["echo", "fail", "ping"]);
    }

    #[test]
    fn ping_answers_pong() {
        let (_server, client) = serve_pair();
        assert_eq!(client.call("ping", Bytes::new()).unwrap().as_ref(), b"pong");
    }

    #[test]
    fn echo_returns_body() {
        let (_server, client) = serve_pair();
        let body = client.call("echo", Bytes::from_static(b"abc")).unwrap();
        assert_eq!(body.as_ref(), b"abc");
    }

    #[test]
    fn fail_returns_request_text_as_error() {
        let (_server, client) = serve_pair();
        let err = client.call("fail", Bytes::from_static(b"boom")).unwrap_err();
        assert!(matches!(err, ChannelError::Remote(ref msg) if msg == "boom"));
    }
}
