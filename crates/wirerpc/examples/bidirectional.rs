//! Bidirectional example: the server calls back into the client while
//! answering the client's own call.
//!
//! Run with:
//!   cargo run --example bidirectional

use std::sync::mpsc;
use std::thread;

use bytes::Bytes;
use wirerpc::channel::{connect, ConnectionListener, DispatchTable};
use wirerpc::transport::Address;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut server_methods = DispatchTable::new();
    server_methods.register_fn("greet", |body: Bytes| {
        Ok::<_, String>(Bytes::from(format!(
            "hello, {}",
            String::from_utf8_lossy(&body)
        )))
    });

    let listener = ConnectionListener::bind(&Address::tcp("127.0.0.1", 0), server_methods)?;
    let address = listener.local_address()?;
    eprintln!("[server] listening on {address}");

    let (done_tx, done_rx) = mpsc::channel();
    let server = thread::spawn(
        move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let conn = listener.accept()?;
            // The client registered `name`; ask it who it is.
            let name = conn.call("name", Bytes::new())?;
            eprintln!("[server] client says it is {}", String::from_utf8_lossy(&name));
            let _ = done_tx.send(());
            conn.join();
            Ok(())
        },
    );

    let mut client_methods = DispatchTable::new();
    client_methods.register_fn("name", |_body: Bytes| {
        Ok::<_, String>(Bytes::from_static(b"example-client"))
    });

    let client = connect(&address, client_methods)?;
    let greeting = client.call("greet", Bytes::from_static(b"world"))?;
    eprintln!("[client] {}", String::from_utf8_lossy(&greeting));

    // Keep the connection up until the server's callback has been answered.
    let _ = done_rx.recv();
    client.close();
    client.join();

    server
        .join()
        .map_err(|_| "server thread panicked")?
        .map_err(|err| err.to_string())?;
    Ok(())
}
