use std::io::{ErrorKind, Write};

use bytes::{Buf, BytesMut};

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Frames queued for the transport to write.
///
/// The transport pulls with [`pending`](Self::pending) and acknowledges what
/// it wrote with [`consume`](Self::consume).
#[derive(Debug)]
pub struct OutboundBuffer {
    buf: BytesMut,
    config: FrameConfig,
}

impl OutboundBuffer {
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

    /// Frame `payload` and queue it behind everything already pending.
    pub fn push_frame(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        encode_frame(payload, &mut self.buf);
        Ok(())
    }

    /// Bytes waiting to be written.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Drop the first `n` pending bytes after the transport wrote them.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
    }

    /// Whether nothing is waiting to be written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write everything pending to `out` (blocking) and flush it.
    pub fn write_to<W: Write>(&mut self, out: &mut W) -> Result<usize> {
        let mut written = 0usize;
        while !self.buf.is_empty() {
            match out.write(&self.buf) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.buf.advance(n);
                    written += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        loop {
            match out.flush() {
                Ok(()) => return Ok(written),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Current buffer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for OutboundBuffer {
    fn default() -> Self {
        Self::new()
    }
}
