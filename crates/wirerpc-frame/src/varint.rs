//! Unsigned base-128 varints.
//!
//! Each byte carries 7 bits of the value, least significant group first.
//! The high bit is set on every byte except the last.

use bytes::BufMut;

use crate::error::{FrameError, Result};

/// Widest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7f;

/// Decode a varint starting at `pos`.
///
/// Returns the value and the position of the byte after it, or `Ok(None)`
/// if `buf` ends before the terminating byte.
pub fn decode_varint(buf: &[u8], pos: usize) -> Result<Option<(u64, usize)>> {
    let mut value = 0u64;
    let mut shift = 0u32;
    let mut cursor = pos;

    loop {
        let Some(&byte) = buf.get(cursor) else {
            return Ok(None);
        };
        cursor += 1;

        let len = cursor - pos;
        // The tenth byte holds bit 63 only; anything more does not fit a u64.
        if len > MAX_VARINT_LEN || (len == MAX_VARINT_LEN && byte > 1) {
            return Err(FrameError::VarintOverflow {
                max: MAX_VARINT_LEN,
            });
        }

        value |= u64::from(byte & PAYLOAD_MASK) << shift;
        shift += 7;

        if byte & CONTINUATION == 0 {
            return Ok(Some((value, cursor)));
        }
    }
}

/// Append the varint encoding of `value` to `dst`.
pub fn encode_varint(mut value: u64, dst: &mut impl BufMut) {
    while value >= u64::from(CONTINUATION) {
        dst.put_u8((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Number of bytes `encode_varint` emits for `value`.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;

    fn encoded(value: u64) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_varint(value, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn zero_is_single_byte() {
        assert_eq!(encoded(0), vec![0x00]);
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encoded(1), vec![0x01]);
        assert_eq!(encoded(127), vec![0x7f]);
        assert_eq!(encoded(128), vec![0x80, 0x01]);
        assert_eq!(encoded(300), vec![0xac, 0x02]);
        assert_eq!(encoded(16_384), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn roundtrip_boundaries() {
        for value in [
            0,
            1,
            127,
            128,
            255,
            16_383,
            16_384,
            u64::from(u32::MAX),
            u64::MAX - 1,
            u64::MAX,
        ] {
            let bytes = encoded(value);
            assert_eq!(bytes.len(), varint_len(value), "length of {value}");
            let decoded = decode_varint(&bytes, 0).unwrap();
            assert_eq!(decoded, Some((value, bytes.len())));
        }
    }

    #[test]
    fn u64_max_uses_ten_bytes() {
        assert_eq!(encoded(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn decode_at_offset() {
        let buf = [0xff, 0xac, 0x02, 0x05];
        assert_eq!(decode_varint(&buf, 1).unwrap(), Some((300, 3)));
        assert_eq!(decode_varint(&buf, 3).unwrap(), Some((5, 4)));
    }

    #[test]
    fn truncated_varint_is_incomplete() {
        assert_eq!(decode_varint(&[0x80, 0x80], 0).unwrap(), None);
        assert_eq!(decode_varint(&[], 0).unwrap(), None);
        assert_eq!(decode_varint(&[0x01], 1).unwrap(), None);
    }

    #[test]
    fn overlong_varint_is_rejected() {
        let buf = [0xffu8; 11];
        let err = decode_varint(&buf, 0).unwrap_err();
        assert!(matches!(err, FrameError::VarintOverflow { max: 10 }));
    }

    #[test]
    fn tenth_byte_beyond_u64_is_rejected() {
        // 2^64 + 1 in ten bytes: would alias 1 if the high bits were dropped.
        let mut buf = vec![0x81];
        buf.extend([0x80; 8]);
        buf.push(0x02);
        let err = decode_varint(&buf, 0).unwrap_err();
        assert!(matches!(err, FrameError::VarintOverflow { max: 10 }));

        let mut max = vec![0xff; 9];
        max.push(0x01);
        assert_eq!(decode_varint(&max, 0).unwrap(), Some((u64::MAX, 10)));
    }

    #[test]
    fn ten_continuation_bytes_wait_for_more() {
        let buf = [0x80u8; 10];
        assert_eq!(decode_varint(&buf, 0).unwrap(), None);
    }
}
