//! Threaded driver that runs an [`RpcChannel`] over an [`RpcStream`].
//!
//! Each connection owns two threads. The reader thread blocks on the socket
//! and forwards received chunks. The driver thread owns the channel and is
//! the only place it is touched: received bytes, calls queued by
//! [`Caller`]s, and close/shutdown requests all arrive on one event queue
//! and are applied in order. After every event the driver flushes whatever
//! the channel queued for writing.

use std::io::{ErrorKind, Read};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};
use wirerpc_frame::FrameConfig;
use wirerpc_transport::RpcStream;

use crate::channel::{ChannelState, RpcChannel};
use crate::dispatch::DispatchTable;
use crate::error::{ChannelError, Result};
use crate::registry::Completion;
use crate::waiter::Waiter;

/// Default read size for the reader thread (8 KiB).
pub const DEFAULT_READ_CHUNK: usize = 8 * 1024;

/// Connection behavior configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Frame limits and write timeout.
    pub frame: FrameConfig,
    /// Bytes requested per socket read.
    pub read_chunk_size: usize,
    /// Prefix for the names of the connection's threads.
    pub thread_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK,
            thread_name: "wirerpc".to_string(),
        }
    }
}

enum Event {
    Inbound(Vec<u8>),
    Call {
        method: String,
        body: Bytes,
        completion: Completion,
    },
    Close,
    Shutdown(String),
    ReaderClosed(String),
}

/// Handle for placing calls on a connection from any thread.
#[derive(Clone)]
pub struct Caller {
    events: Sender<Event>,
}

impl Caller {
    /// Queue a call; `completion` runs on the connection's driver thread.
    ///
    /// Fails with [`ChannelError::Closed`] if the connection has already
    /// stopped, in which case the completion is dropped uncalled. Errors
    /// found by the channel itself (empty method, closing channel) are
    /// delivered through the completion.
    pub fn send(
        &self,
        method: impl Into<String>,
        body: impl Into<Bytes>,
        completion: Completion,
    ) -> Result<()> {
        let event = Event::Call {
            method: method.into(),
            body: body.into(),
            completion,
        };
        self.events
            .send(event)
            .map_err(|_| ChannelError::Closed(ChannelState::Closed))
    }

    /// Call `method` and block until the peer answers.
    ///
    /// There is no deadline; the call fails only if the peer answers with
    /// an error or the connection goes away.
    ///
    /// Never call this from a handler serving the same connection; the
    /// driver thread would wait on a reply only it can deliver.
    pub fn call(&self, method: impl Into<String>, body: impl Into<Bytes>) -> Result<Bytes> {
        let waiter = Waiter::new();
        self.send(method, body, waiter.completion())?;
        waiter.wait()
    }

    /// Call `method` and wait at most `timeout` for the answer.
    pub fn call_timeout(
        &self,
        method: impl Into<String>,
        body: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<Bytes> {
        let waiter = Waiter::new();
        self.send(method, body, waiter.completion())?;
        waiter.wait_timeout(timeout)
    }
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller").finish_non_exhaustive()
    }
}

/// A running RPC connection.
///
/// Dropping the handle shuts the connection down; outstanding calls made
/// through any [`Caller`] then fail with [`ChannelError::Disconnected`].
pub struct Connection {
    events: Sender<Event>,
    driver: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    transport: &'static str,
}

impl Connection {
    /// Start serving `stream` with the handlers in `dispatch`.
    pub fn spawn(stream: RpcStream, dispatch: DispatchTable) -> Result<Self> {
        Self::spawn_with_config(stream, dispatch, ConnectionConfig::default())
    }

    pub fn spawn_with_config(
        stream: RpcStream,
        dispatch: DispatchTable,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let transport = stream.transport_name();
        stream.set_write_timeout(config.frame.write_timeout)?;
        let reader_stream = stream.try_clone()?;

        let (events, inbox) = mpsc::channel();
        let channel = RpcChannel::with_config(dispatch, config.frame.clone());

        let driver = thread::Builder::new()
            .name(format!("{}-driver", config.thread_name))
            .spawn(move || drive(channel, stream, inbox))?;

        let reader_events = events.clone();
        let chunk = config.read_chunk_size.max(1);
        let reader = match thread::Builder::new()
            .name(format!("{}-reader", config.thread_name))
            .spawn(move || read_loop(reader_stream, reader_events, chunk))
        {
            Ok(reader) => reader,
            Err(err) => {
                let _ = events.send(Event::Shutdown("reader thread failed to start".to_string()));
                return Err(err.into());
            }
        };

        info!(transport, "connection started");
        Ok(Self {
            events,
            driver: Some(driver),
            reader: Some(reader),
            transport,
        })
    }

    /// A handle for placing calls from other threads.
    pub fn caller(&self) -> Caller {
        Caller {
            events: self.events.clone(),
        }
    }

    /// Call `method` and block until the peer answers.
    pub fn call(&self, method: impl Into<String>, body: impl Into<Bytes>) -> Result<Bytes> {
        self.caller().call(method, body)
    }

    /// Stop accepting new calls. The connection ends once every in-flight
    /// call has been answered.
    pub fn close(&self) {
        let _ = self.events.send(Event::Close);
    }

    /// End the connection now, failing every outstanding call.
    pub fn shutdown(&self) {
        let _ = self
            .events
            .send(Event::Shutdown("connection shut down locally".to_string()));
    }

    /// Whether the driver thread has exited.
    pub fn is_finished(&self) -> bool {
        self.driver.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Transport name of the underlying stream.
    pub fn transport(&self) -> &'static str {
        self.transport
    }

    /// Block until both connection threads have exited.
    pub fn join(mut self) {
        self.join_threads();
    }

    fn join_threads(&mut self) {
        for (role, handle) in [("driver", self.driver.take()), ("reader", self.reader.take())] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    warn!(role, "connection thread panicked");
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.driver.is_some() {
            let _ = self
                .events
                .send(Event::Shutdown("connection handle dropped".to_string()));
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("transport", &self.transport)
            .field("finished", &self.is_finished())
            .finish()
    }
}

fn drive(mut channel: RpcChannel, mut stream: RpcStream, inbox: Receiver<Event>) {
    let reason = loop {
        let Ok(event) = inbox.recv() else {
            break "all connection handles dropped".to_string();
        };

        match event {
            Event::Inbound(data) => {
                if let Err(err) = channel.on_data_received(&data) {
                    warn!(error = %err, "unrecoverable inbound stream");
                    break format!("corrupt inbound stream: {err}");
                }
            }
            Event::Call {
                method,
                body,
                completion,
            } => {
                if let Err((err, completion)) = channel.try_send(method, body, completion) {
                    completion(Err(err));
                }
            }
            Event::Close => channel.close(),
            Event::Shutdown(reason) | Event::ReaderClosed(reason) => break reason,
        }

        if channel.has_pending_write() {
            if let Err(err) = channel.write_pending(&mut stream) {
                warn!(error = %err, "write failed");
                break format!("write failed: {err}");
            }
        }

        if channel.state() == ChannelState::Closing && channel.pending_calls() == 0 {
            break "closed".to_string();
        }
    };

    channel.shutdown(reason.as_str());

    // Calls queued behind the terminating event never reached the channel.
    while let Ok(event) = inbox.try_recv() {
        if let Event::Call { completion, .. } = event {
            completion(Err(ChannelError::Closed(ChannelState::Closed)));
        }
    }

    // Unblocks the reader thread.
    if let Err(err) = stream.shutdown() {
        debug!(error = %err, "socket shutdown failed");
    }
    info!(reason = %reason, "connection finished");
}

fn read_loop(mut stream: RpcStream, events: Sender<Event>, chunk: usize) {
    let mut buf = vec![0u8; chunk];
    let reason = loop {
        match stream.read(&mut buf) {
            Ok(0) => break "peer closed the connection".to_string(),
            Ok(n) => {
                if events.send(Event::Inbound(buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => break format!("read failed: {err}"),
        }
    };

    debug!(reason = %reason, "reader stopped");
    let _ = events.send(Event::ReaderClosed(reason));
}
