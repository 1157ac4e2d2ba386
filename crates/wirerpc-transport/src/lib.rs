//! Byte-stream transports for wirerpc.
//!
//! Provides a unified interface over the connection types a channel can
//! run on:
//! - TCP (`host:port`)
//! - Unix domain sockets (`unix:/path`, Linux/macOS)
//!
//! This is the lowest layer of wirerpc. Connections are plain blocking
//! streams; the channel layer decides what to read and write.

pub mod address;
pub mod error;
pub mod listener;
pub mod stream;

pub use address::Address;
pub use error::{Result, TransportError};
pub use listener::RpcListener;
pub use stream::RpcStream;
