//! Minimal echo server: accepts one connection and answers `echo` calls.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal (use the path printed on startup):
//!   cargo run --features cli -- call unix:/tmp/wirerpc-echo-<pid>/echo.sock \
//!     echo --data hello

use std::fs;

use bytes::Bytes;
use wirerpc::channel::{ConnectionListener, DispatchTable};
use wirerpc::transport::Address;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("wirerpc-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let address = Address::unix(sock_dir.join("echo.sock"));

    let mut methods = DispatchTable::new();
    methods.register_fn("echo", |body: Bytes| {
        eprintln!("Received {} bytes", body.len());
        Ok::<_, std::convert::Infallible>(body)
    });

    let listener = ConnectionListener::bind(&address, methods)?;
    eprintln!("Listening on {address}");

    // Serve one connection until the client disconnects.
    let conn = listener.accept()?;
    eprintln!("Client connected over {}", conn.transport());
    conn.join();

    drop(listener);
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
