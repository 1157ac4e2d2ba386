//! Bidirectional request/response RPC over a framed byte stream.
//!
//! Each side of a connection can both serve methods and call the peer. A
//! request names a method and carries opaque bytes; the answer carries the
//! same id plus either response bytes or an error string.
//!
//! Layers, bottom up:
//! - [`Message`] / [`Envelope`]: the record carried in each frame
//! - [`RpcChannel`]: sans-I/O state machine (dispatch, correlation, ids)
//! - [`Waiter`]: blocking handoff from the driver thread to a caller
//! - [`Connection`] / [`Caller`]: threads that drive a channel over an
//!   [`RpcStream`](wirerpc_transport::RpcStream)
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use wirerpc_channel::{connect, DispatchTable};
//! use wirerpc_transport::Address;
//!
//! # fn main() -> wirerpc_channel::Result<()> {
//! let address: Address = "127.0.0.1:7700".parse()?;
//! let conn = connect(&address, DispatchTable::new())?;
//! let reply = conn.call("echo", Bytes::from_static(b"hello"))?;
//! assert_eq!(reply.as_ref(), b"hello");
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod connection;
pub mod connector;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod message;
pub mod registry;
pub mod waiter;

pub use channel::{ChannelState, RpcChannel};
pub use connection::{Caller, Connection, ConnectionConfig, DEFAULT_READ_CHUNK};
pub use connector::{connect, connect_with_config};
pub use context::RequestContext;
pub use dispatch::{DispatchTable, Handler, HandlerError, HandlerResult};
pub use error::{ChannelError, Result};
pub use listener::ConnectionListener;
pub use message::{Envelope, Message, Outcome, Request, Response};
pub use registry::{Completion, WaiterRegistry};
pub use waiter::Waiter;
