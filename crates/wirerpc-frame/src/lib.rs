//! Varint length-prefixed framing for wirerpc.
//!
//! Every message on the byte stream is framed as:
//! - An unsigned base-128 varint holding the payload length
//! - The payload bytes
//!
//! Inbound bytes accumulate in an [`InboundBuffer`] that hands back whole
//! payloads only; outbound frames queue in an [`OutboundBuffer`] until the
//! transport writes them.

pub mod codec;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod varint;

pub use codec::{encode_frame, unwrap_frame, wrap_frame, FrameConfig, DEFAULT_MAX_PAYLOAD};
pub use error::{FrameError, Result};
pub use inbound::{DrainFrames, InboundBuffer};
pub use outbound::OutboundBuffer;
pub use varint::{decode_varint, encode_varint, varint_len, MAX_VARINT_LEN};
