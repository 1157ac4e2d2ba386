/// Errors that can occur during frame encoding/decoding.
///
/// Running out of bytes is not an error: decoders report it as `Ok(None)`
/// and the caller retries once more data has arrived.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A varint ran past the widest encoding of a 64-bit value.
    #[error("varint longer than {max} bytes")]
    VarintOverflow { max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
