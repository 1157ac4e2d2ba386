use std::time::Duration;

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] wirerpc_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] wirerpc_frame::FrameError),

    /// A frame payload is not a well-formed message.
    #[error("malformed message: {0}")]
    Decode(String),

    /// Requests must name a method; an empty method marks a response.
    #[error("method name must not be empty")]
    EmptyMethod,

    /// The channel no longer accepts new calls.
    #[error("channel is {0}")]
    Closed(crate::channel::ChannelState),

    /// The connection went away before the call was answered.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// The peer answered the call with an error.
    #[error("remote error: {0}")]
    Remote(String),

    /// No answer arrived within the caller's deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// A request context was asked to reply a second time.
    #[error("request {0} has already been answered")]
    AlreadyReplied(u64),

    /// A call id was registered while an earlier call with the same id is
    /// still pending.
    #[error("call id {0} is already pending")]
    DuplicateId(u64),

    /// I/O error outside the transport layer (thread spawn, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
