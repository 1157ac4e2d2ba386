use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use tracing::{debug, error, info, warn};
use wirerpc_frame::{FrameConfig, InboundBuffer, OutboundBuffer};

use crate::context::{push_message, RequestContext};
use crate::dispatch::DispatchTable;
use crate::error::{ChannelError, Result};
use crate::message::{Envelope, Message, Request, Response};
use crate::registry::{Completion, WaiterRegistry};

/// Lifecycle of a channel. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Accepting new calls.
    Open,
    /// No new calls; in-flight calls still complete.
    Closing,
    /// Terminal. Pending calls have been resolved as disconnected.
    Closed,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelState::Open => "open",
            ChannelState::Closing => "closing",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Sans-I/O RPC endpoint for one connection.
///
/// Received bytes go in through [`on_data_received`](Self::on_data_received);
/// bytes to transmit come out through
/// [`bytes_pending_write`](Self::bytes_pending_write) and
/// [`consume_written`](Self::consume_written). The channel is driven from a
/// single thread; see [`Connection`](crate::Connection) for the threaded
/// driver that lets any thread place calls.
#[derive(Debug)]
pub struct RpcChannel {
    state: ChannelState,
    inbound: InboundBuffer,
    outbound: OutboundBuffer,
    dispatch: DispatchTable,
    waiters: WaiterRegistry,
    last_id: u64,
}

impl RpcChannel {
    pub fn new(dispatch: DispatchTable) -> Self {
        Self::with_config(dispatch, FrameConfig::default())
    }

    pub fn with_config(dispatch: DispatchTable, config: FrameConfig) -> Self {
        Self {
            state: ChannelState::Open,
            inbound: InboundBuffer::with_config(config.clone()),
            outbound: OutboundBuffer::with_config(config),
            dispatch,
            waiters: WaiterRegistry::new(),
            last_id: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    /// Handlers may be added or replaced while the channel runs.
    pub fn dispatch_mut(&mut self) -> &mut DispatchTable {
        &mut self.dispatch
    }

    /// Feed bytes received from the peer.
    ///
    /// Every complete frame is processed in arrival order; a trailing partial
    /// frame stays buffered until the next call. Returns an error only when
    /// the byte stream itself is corrupt (oversized length prefix or an
    /// overlong varint), after which the stream cannot be resynchronised.
    pub fn on_data_received(&mut self, data: &[u8]) -> Result<()> {
        self.inbound.append(data);
        while let Some(payload) = self.inbound.next_frame()? {
            self.process_frame(payload);
        }
        Ok(())
    }

    fn process_frame(&mut self, payload: Bytes) {
        let message = match Message::decode(&payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(len = payload.len(), error = %err, "dropping undecodable message");
                return;
            }
        };

        match Envelope::from(message) {
            Envelope::Request(request) if self.state == ChannelState::Closed => {
                warn!(
                    id = request.id,
                    method = %request.method,
                    "dropping request on closed channel"
                );
            }
            Envelope::Request(request) => self.dispatch_request(request),
            Envelope::Response(response) => self.deliver_response(response),
        }
    }

    fn dispatch_request(&mut self, request: Request) {
        let Request { id, method, body } = request;

        let Some(handler) = self.dispatch.lookup(&method) else {
            warn!(id, method = %method, "request for unknown method");
            let reply = Message::failure(id, format!("unknown method: {method}"));
            if let Err(err) = push_message(&mut self.outbound, &reply) {
                warn!(id, error = %err, "failed to queue unknown-method reply");
            }
            return;
        };

        debug!(id, method = %method, len = body.len(), "dispatching request");
        let mut ctx = RequestContext::new(id, &method, &mut self.outbound);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.call(&mut ctx, body)));

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(id, method = %method, panic = %reason, "handler panicked");
                Some(format!("handler panicked: {reason}"))
            }
        };

        match failure {
            Some(reason) if !ctx.has_replied() => {
                debug!(id, method = %method, error = %reason, "handler failed");
                if let Err(err) = ctx.send_error(reason) {
                    warn!(id, error = %err, "failed to queue error reply");
                }
            }
            Some(reason) => {
                debug!(id, method = %method, error = %reason, "handler failed after replying");
            }
            None if !ctx.has_replied() => {
                warn!(id, method = %method, "handler returned without replying");
            }
            None => {}
        }
    }

    fn deliver_response(&mut self, response: Response) {
        let id = response.id;
        match self.waiters.take(id) {
            Some(completion) => {
                debug!(id, error = response.is_error(), "delivering response");
                completion(Ok(response));
            }
            None => warn!(id, "dropping response for untracked call"),
        }
    }

    /// Queue a call to `method` on the peer.
    ///
    /// `completion` runs on the thread driving the channel, exactly once:
    /// with the peer's response, or with [`ChannelError::Disconnected`] if
    /// the channel shuts down first. If the call is rejected here the
    /// completion is dropped without being called.
    pub fn send(
        &mut self,
        method: impl Into<String>,
        body: impl Into<Bytes>,
        completion: Completion,
    ) -> Result<u64> {
        self.try_send(method.into(), body.into(), completion)
            .map_err(|(err, _)| err)
    }

    /// Like [`send`](Self::send), but hands the completion back on failure.
    pub(crate) fn try_send(
        &mut self,
        method: String,
        body: Bytes,
        completion: Completion,
    ) -> std::result::Result<u64, (ChannelError, Completion)> {
        if method.is_empty() {
            return Err((ChannelError::EmptyMethod, completion));
        }
        if self.state != ChannelState::Open {
            return Err((ChannelError::Closed(self.state), completion));
        }

        let id = self.next_id();
        let message = Message::request(id, method, body);
        if let Err(err) = push_message(&mut self.outbound, &message) {
            return Err((err, completion));
        }
        // next_id never returns an id that is still pending.
        if let Err(err) = self.waiters.insert(id, completion) {
            error!(id, error = %err, "call id collision");
        }

        debug!(id, method = %message.method, pending = self.waiters.len(), "queued call");
        Ok(id)
    }

    /// Ids start at 1. On wrap-around, 0 and still-pending ids are skipped.
    fn next_id(&mut self) -> u64 {
        loop {
            self.last_id = self.last_id.wrapping_add(1);
            if self.last_id != 0 && !self.waiters.contains(self.last_id) {
                return self.last_id;
            }
        }
    }

    /// Bytes waiting to be written to the transport.
    #[inline]
    pub fn bytes_pending_write(&self) -> &[u8] {
        self.outbound.pending()
    }

    /// Mark the first `n` pending bytes as written.
    pub fn consume_written(&mut self, n: usize) {
        self.outbound.consume(n);
    }

    #[inline]
    pub fn has_pending_write(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Write every pending byte to `out` and flush it.
    pub fn write_pending<W: Write>(&mut self, out: &mut W) -> Result<usize> {
        Ok(self.outbound.write_to(out)?)
    }

    /// Stop accepting new calls.
    ///
    /// Calls already in flight keep their registry entries and complete when
    /// their responses arrive.
    pub fn close(&mut self) {
        if self.state == ChannelState::Open {
            self.state = ChannelState::Closing;
            debug!(pending = self.waiters.len(), "channel closing");
        }
    }

    /// Terminate the channel and fail every pending call with
    /// [`ChannelError::Disconnected`]. Returns the number of calls resolved.
    pub fn shutdown(&mut self, reason: impl Into<String>) -> usize {
        let reason = reason.into();
        self.state = ChannelState::Closed;

        let pending = self.waiters.drain();
        let count = pending.len();
        for (id, completion) in pending {
            debug!(id, "failing pending call");
            completion(Err(ChannelError::Disconnected(reason.clone())));
        }

        if count > 0 {
            info!(pending = count, reason = %reason, "channel shut down with calls in flight");
        } else {
            debug!(reason = %reason, "channel shut down");
        }
        count
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.waiters.len()
    }

    /// Ids of calls awaiting a response, ascending.
    pub fn pending_ids(&self) -> Vec<u64> {
        self.waiters.ids()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
