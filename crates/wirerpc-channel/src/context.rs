use bytes::Bytes;
use tracing::debug;
use wirerpc_frame::OutboundBuffer;

use crate::error::{ChannelError, Result};
use crate::message::Message;

/// Substituted when a handler reports an error with no text, since an empty
/// error field would read as success on the other side.
const UNSPECIFIED_ERROR: &str = "unspecified error";

/// Reply handle for one inbound request.
///
/// Exactly one of [`send_response`](Self::send_response) or
/// [`send_error`](Self::send_error) should be called per request; a caller
/// that is never answered stays blocked until its connection closes.
#[derive(Debug)]
pub struct RequestContext<'a> {
    id: u64,
    method: &'a str,
    outbound: &'a mut OutboundBuffer,
    replied: bool,
}

impl<'a> RequestContext<'a> {
    pub(crate) fn new(id: u64, method: &'a str, outbound: &'a mut OutboundBuffer) -> Self {
        Self {
            id,
            method,
            outbound,
            replied: false,
        }
    }

    /// Id of the request being answered.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Method the request named.
    #[inline]
    pub fn method(&self) -> &str {
        self.method
    }

    /// Whether a reply has been queued.
    #[inline]
    pub fn has_replied(&self) -> bool {
        self.replied
    }

    /// Answer the request successfully.
    pub fn send_response(&mut self, body: impl Into<Bytes>) -> Result<()> {
        self.reply(Message::success(self.id, body))
    }

    /// Answer the request with an error string.
    pub fn send_error(&mut self, error: impl Into<String>) -> Result<()> {
        let mut error = error.into();
        if error.is_empty() {
            error = UNSPECIFIED_ERROR.to_string();
        }
        self.reply(Message::failure(self.id, error))
    }

    fn reply(&mut self, message: Message) -> Result<()> {
        if self.replied {
            return Err(ChannelError::AlreadyReplied(self.id));
        }
        push_message(self.outbound, &message)?;
        self.replied = true;
        debug!(
            id = self.id,
            method = self.method,
            error = !message.error.is_empty(),
            "queued reply"
        );
        Ok(())
    }
}

/// Encode `message` and queue it as one frame.
pub(crate) fn push_message(outbound: &mut OutboundBuffer, message: &Message) -> Result<()> {
    outbound.push_frame(&message.encode())?;
    Ok(())
}
