//! Bidirectional RPC over varint-framed byte streams.
//!
//! Either end of a connection can register method handlers and call the
//! other end. Requests and responses travel as protobuf-compatible messages
//! inside varint length-prefixed frames, over TCP or Unix domain sockets.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream transports (TCP, Unix domain sockets)
//! - [`frame`]: Varint codec and length-prefixed framing buffers
//! - [`channel`]: Messages, dispatch, call correlation and connection
//!   drivers (behind the `channel` feature, on by default)

/// Re-export transport types.
pub mod transport {
    pub use wirerpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use wirerpc_frame::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use wirerpc_channel::*;
}
