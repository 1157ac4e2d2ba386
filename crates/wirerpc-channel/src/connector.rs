use wirerpc_transport::{Address, RpcStream};

use crate::connection::{Connection, ConnectionConfig};
use crate::dispatch::DispatchTable;
use crate::error::Result;

/// Connect to a listening peer.
///
/// `dispatch` serves calls the peer makes back over the same connection;
/// pass an empty table for a call-only client.
pub fn connect(address: &Address, dispatch: DispatchTable) -> Result<Connection> {
    connect_with_config(address, dispatch, ConnectionConfig::default())
}

/// Connect with explicit configuration.
pub fn connect_with_config(
    address: &Address,
    dispatch: DispatchTable,
    config: ConnectionConfig,
) -> Result<Connection> {
    let stream = RpcStream::connect(address)?;
    Connection::spawn_with_config(stream, dispatch, config)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use bytes::Bytes;
    use wirerpc_frame::FrameConfig;
    use wirerpc_transport::TransportError;

    use super::*;
    use crate::error::ChannelError;
    use crate::listener::ConnectionListener;

    #[test]
    fn connect_convenience() {
        let mut table = DispatchTable::new();
        table.register_fn("echo", |body: Bytes| Ok::<_, String>(body));
        let listener = ConnectionListener::bind(&Address::tcp("127.0.0.1", 0), table)
            .expect("listener should bind");
        let address = listener.local_address().expect("address should resolve");

        let server = thread::spawn(move || {
            listener.accept().expect("listener should accept").join();
        });

        let client = connect(&address, DispatchTable::new()).expect("client should connect");
        let response = client
            .call("echo", Bytes::from_static(b"hello"))
            .expect("call should succeed");
        assert_eq!(response.as_ref(), b"hello");

        client.close();
        client.join();
        server.join().expect("server thread should complete");
    }

    #[test]
    fn large_payload_round_trips() {
        let mut table = DispatchTable::new();
        table.register_fn("len", |body: Bytes| {
            Ok::<_, String>(Bytes::from(body.len().to_string()))
        });
        let listener = ConnectionListener::bind(&Address::tcp("127.0.0.1", 0), table)
            .expect("listener should bind");
        let address = listener.local_address().expect("address should resolve");

        let server = thread::spawn(move || {
            listener.accept().expect("listener should accept").join();
        });

        let client = connect(&address, DispatchTable::new()).expect("client should connect");
        let payload = vec![0xAB; 256 * 1024];
        let response = client.call("len", payload).expect("call should succeed");
        assert_eq!(response.as_ref(), b"262144");

        client.close();
        client.join();
        server.join().expect("server thread should complete");
    }

    #[test]
    fn oversized_call_rejected_locally() {
        let listener =
            ConnectionListener::bind(&Address::tcp("127.0.0.1", 0), DispatchTable::new())
                .expect("listener should bind");
        let address = listener.local_address().expect("address should resolve");
        let server = thread::spawn(move || {
            listener.accept().expect("listener should accept").join();
        });

        let config = ConnectionConfig {
            frame: FrameConfig {
                max_payload_size: 64,
                ..FrameConfig::default()
            },
            ..ConnectionConfig::default()
        };
        let client = connect_with_config(&address, DispatchTable::new(), config)
            .expect("client should connect");

        let err = client.call("big", vec![0u8; 1024]).unwrap_err();
        assert!(matches!(err, ChannelError::Frame(_)));

        client.shutdown();
        client.join();
        server.join().expect("server thread should complete");
    }

    #[test]
    fn connect_refused_reports_transport_error() {
        // Bind then drop to find a port nobody is listening on.
        let address = {
            let listener =
                ConnectionListener::bind(&Address::tcp("127.0.0.1", 0), DispatchTable::new())
                    .expect("listener should bind");
            listener.local_address().expect("address should resolve")
        };

        let err = connect(&address, DispatchTable::new()).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Transport(TransportError::Connect { .. })
        ));
    }
}
