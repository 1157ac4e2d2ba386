use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::varint::{decode_varint, encode_varint, varint_len};

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Append one frame to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────────┬──────────────────┐
/// │ Length (varint)  │ Payload          │
/// │ 1-10 bytes       │ (Length bytes)   │
/// └──────────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(varint_len(payload.len() as u64) + payload.len());
    encode_varint(payload.len() as u64, dst);
    dst.put_slice(payload);
}

/// Wrap a payload as a standalone frame.
pub fn wrap_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::new();
    encode_frame(payload, &mut buf);
    buf.freeze()
}

/// Locate the frame starting at `pos` without consuming it.
///
/// Returns the payload slice and the position just past the frame, or
/// `Ok(None)` if the length prefix or the payload is not fully buffered yet.
pub fn unwrap_frame(buf: &[u8], pos: usize, max_payload: usize) -> Result<Option<(&[u8], usize)>> {
    let Some((len, body_start)) = decode_varint(buf, pos)? else {
        return Ok(None); // Need more data
    };

    let len = usize::try_from(len).unwrap_or(usize::MAX);
    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }

    let end = body_start.saturating_add(len);
    if buf.len() < end {
        return Ok(None); // Need more data
    }

    Ok(Some((&buf[body_start..end], end)))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Write timeout for blocking stream writes.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let payload = b"hello, wirerpc!";
        let wire = wrap_frame(payload);

        assert_eq!(wire.len(), 1 + payload.len());

        let (body, next) = unwrap_frame(&wire, 0, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(body, payload);
        assert_eq!(next, wire.len());
    }

    #[test]
    fn test_two_byte_length_prefix() {
        let payload = vec![0x5a; 300];
        let wire = wrap_frame(&payload);

        assert_eq!(&wire[..2], &[0xac, 0x02]);
        let (body, next) = unwrap_frame(&wire, 0, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(body, payload.as_slice());
        assert_eq!(next, 302);
    }

    #[test]
    fn test_unwrap_incomplete_length() {
        let result = unwrap_frame(&[0x80], 0, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_unwrap_incomplete_payload() {
        let wire = wrap_frame(b"hello");
        let result = unwrap_frame(&wire[..3], 0, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_unwrap_payload_too_large() {
        let mut buf = BytesMut::new();
        encode_varint(32 * 1024 * 1024, &mut buf);

        let result = unwrap_frame(&buf, 0, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_unwrap_does_not_touch_following_frame() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf);
        encode_frame(b"second", &mut buf);

        let (first, next) = unwrap_frame(&buf, 0, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(first, b"first");

        let (second, end) = unwrap_frame(&buf, next, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(second, b"second");
        assert_eq!(end, buf.len());
    }

    #[test]
    fn test_empty_payload() {
        let wire = wrap_frame(b"");
        assert_eq!(wire.as_ref(), &[0x00]);

        let (body, next) = unwrap_frame(&wire, 0, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(body.is_empty());
        assert_eq!(next, 1);
    }
}
