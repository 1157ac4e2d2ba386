use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

use crate::codec::{unwrap_frame, FrameConfig};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Accumulates received bytes and yields complete frame payloads.
///
/// A trailing partial frame stays buffered verbatim until the rest of it
/// is appended.
#[derive(Debug)]
pub struct InboundBuffer {
    buf: BytesMut,
    config: FrameConfig,
}

impl InboundBuffer {
    /// Create an empty buffer with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create an empty buffer with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Append newly received bytes.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the next complete payload off the front of the buffer.
    ///
    /// Returns `Ok(None)` when only a partial frame (or nothing) remains.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        let decoded = unwrap_frame(&self.buf, 0, self.config.max_payload_size).inspect_err(|err| {
            debug!(buffered = self.buf.len(), error = %err, "rejecting corrupt frame");
        })?;
        let Some((payload, end)) = decoded else {
            return Ok(None);
        };
        let start = end - payload.len();

        self.buf.advance(start);
        Ok(Some(self.buf.split_to(end - start).freeze()))
    }

    /// Iterate over every payload that can be fully decoded right now.
    ///
    /// The iterator stops at the first partial frame, or after yielding the
    /// first error.
    pub fn drain_frames(&mut self) -> DrainFrames<'_> {
        DrainFrames {
            inner: self,
            failed: false,
        }
    }

    /// Number of buffered bytes not yet consumed as frames.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current buffer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for InboundBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`InboundBuffer::drain_frames`].
#[derive(Debug)]
pub struct DrainFrames<'a> {
    inner: &'a mut InboundBuffer,
    failed: bool,
}

impl Iterator for DrainFrames<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.inner.next_frame() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, wrap_frame};
    use crate::error::FrameError;
    use crate::varint::encode_varint;

    fn drain(buffer: &mut InboundBuffer) -> Vec<Bytes> {
        buffer
            .drain_frames()
            .collect::<Result<Vec<_>>>()
            .expect("frames should decode")
    }

    #[test]
    fn single_frame() {
        let mut buffer = InboundBuffer::new();
        buffer.append(&wrap_frame(b"hello"));

        let frames = drain(&mut buffer);
        assert_eq!(frames, vec![Bytes::from_static(b"hello")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn multiple_frames_in_one_append() {
        let mut wire = BytesMut::new();
        encode_frame(b"one", &mut wire);
        encode_frame(b"two", &mut wire);
        encode_frame(b"three", &mut wire);

        let mut buffer = InboundBuffer::new();
        buffer.append(&wire);

        let frames = drain(&mut buffer);
        assert_eq!(
            frames,
            vec![
                Bytes::from_static(b"one"),
                Bytes::from_static(b"two"),
                Bytes::from_static(b"three"),
            ]
        );
    }

    #[test]
    fn byte_by_byte_delivery_yields_once_at_the_end() {
        let payload = vec![0xab; 200];
        let wire = wrap_frame(&payload);
        let mut buffer = InboundBuffer::new();

        for (i, byte) in wire.iter().enumerate() {
            buffer.append(&[*byte]);
            let frames = drain(&mut buffer);
            if i + 1 < wire.len() {
                assert!(frames.is_empty(), "frame yielded early at byte {i}");
            } else {
                assert_eq!(frames, vec![Bytes::from(payload.clone())]);
            }
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn trailing_partial_frame_is_retained() {
        let mut wire = BytesMut::new();
        encode_frame(b"complete", &mut wire);
        let second = wrap_frame(b"partial");
        wire.extend_from_slice(&second[..4]);

        let mut buffer = InboundBuffer::new();
        buffer.append(&wire);

        assert_eq!(drain(&mut buffer), vec![Bytes::from_static(b"complete")]);
        assert_eq!(buffer.len(), 4);

        buffer.append(&second[4..]);
        assert_eq!(drain(&mut buffer), vec![Bytes::from_static(b"partial")]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut buffer = InboundBuffer::new();
        assert!(drain(&mut buffer).is_empty());
        assert!(buffer.next_frame().unwrap().is_none());
    }

    #[test]
    fn empty_payload_frame() {
        let mut buffer = InboundBuffer::new();
        buffer.append(&[0x00, 0x00]);
        assert_eq!(drain(&mut buffer), vec![Bytes::new(), Bytes::new()]);
    }

    #[test]
    fn oversized_frame_stops_iteration_with_error() {
        let mut wire = BytesMut::new();
        encode_frame(b"ok", &mut wire);
        encode_varint(1024, &mut wire);

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut buffer = InboundBuffer::with_config(cfg);
        buffer.append(&wire);

        let mut frames = buffer.drain_frames();
        assert_eq!(frames.next().unwrap().unwrap().as_ref(), b"ok");
        assert!(matches!(
            frames.next(),
            Some(Err(FrameError::PayloadTooLarge { size: 1024, max: 16 }))
        ));
        assert!(frames.next().is_none());
    }

    #[test]
    fn drain_is_restartable_across_appends() {
        let first = wrap_frame(b"a");
        let second = wrap_frame(b"b");
        let mut buffer = InboundBuffer::new();

        buffer.append(&first);
        assert_eq!(drain(&mut buffer).len(), 1);
        assert!(drain(&mut buffer).is_empty());

        buffer.append(&second);
        assert_eq!(drain(&mut buffer), vec![Bytes::from_static(b"b")]);
    }
}
