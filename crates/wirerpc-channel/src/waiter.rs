//! One-shot handoff between the thread that receives a response and the
//! thread blocked waiting for it.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::warn;

use crate::error::{ChannelError, Result};
use crate::message::Response;
use crate::registry::Completion;

struct Shared {
    slot: Mutex<Option<Result<Response>>>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<Result<Response>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, value: Result<Response>) {
        let mut slot = self.lock();
        if slot.is_some() {
            warn!("waiter resolved more than once; keeping the latest value");
        }
        *slot = Some(value);
        self.ready.notify_all();
    }
}

/// Single-slot future a caller blocks on until its response arrives.
///
/// The producing side is the [`Completion`] returned by
/// [`completion`](Self::completion). If that completion is dropped without
/// being called, the waiter resolves with [`ChannelError::Disconnected`], so a
/// call lost inside a dead connection never blocks its caller forever.
pub struct Waiter {
    shared: Arc<Shared>,
}

impl Waiter {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// A completion callback that resolves this waiter.
    pub fn completion(&self) -> Completion {
        let resolver = Resolver {
            shared: Some(Arc::clone(&self.shared)),
        };
        Box::new(move |value| resolver.resolve(value))
    }

    /// Store `value` and wake the waiting thread.
    ///
    /// Resolving twice is tolerated: the later value replaces the earlier one
    /// if it has not been taken yet.
    pub fn resolve(&self, value: Result<Response>) {
        self.shared.resolve(value);
    }

    /// Whether a value is available without blocking.
    pub fn is_resolved(&self) -> bool {
        self.shared.lock().is_some()
    }

    /// Block until the response arrives.
    ///
    /// Returns the response body, or [`ChannelError::Remote`] if the peer
    /// answered with an error.
    pub fn wait(self) -> Result<Bytes> {
        self.wait_response()?.into_result()
    }

    /// Block until the response arrives, without interpreting its outcome.
    pub fn wait_response(self) -> Result<Response> {
        let mut slot = self.shared.lock();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            slot = self
                .shared
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`.
    ///
    /// On timeout the call is still outstanding on the channel; its late
    /// response is discarded.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.lock();
        loop {
            if let Some(value) = slot.take() {
                return value?.into_result();
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ChannelError::Timeout(timeout));
            }
            slot = self
                .shared
                .ready
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Producer half captured by a waiter's completion callback.
struct Resolver {
    shared: Option<Arc<Shared>>,
}

impl Resolver {
    fn resolve(mut self, value: Result<Response>) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(value);
        }
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(Err(ChannelError::Disconnected(
                "call dropped before a response arrived".to_string(),
            )));
        }
    }
}
