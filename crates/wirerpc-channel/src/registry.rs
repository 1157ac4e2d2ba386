use std::collections::HashMap;

use crate::error::{ChannelError, Result};
use crate::message::Response;

/// Callback run once with the answer to an outbound call.
///
/// It receives `Err` only when the channel shuts down before the peer
/// answered.
pub type Completion = Box<dyn FnOnce(Result<Response>) + Send + 'static>;

/// Outstanding outbound calls, keyed by call id.
///
/// Each entry is removed exactly once: by the matching response, or by
/// [`drain`](Self::drain) when the channel shuts down.
#[derive(Default)]
pub struct WaiterRegistry {
    entries: HashMap<u64, Completion>,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the completion for call `id`.
    ///
    /// A second registration for a pending id is rejected and the original
    /// entry is kept; the rejected completion is dropped uncalled.
    pub fn insert(&mut self, id: u64, completion: Completion) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(ChannelError::DuplicateId(id));
        }
        self.entries.insert(id, completion);
        Ok(())
    }

    /// Remove and return the completion for call `id`.
    pub fn take(&mut self, id: u64) -> Option<Completion> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of pending calls in ascending order (for diagnostics).
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Remove every pending entry, lowest id first.
    pub fn drain(&mut self) -> Vec<(u64, Completion)> {
        let mut entries: Vec<(u64, Completion)> = self.entries.drain().collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries
    }
}

impl std::fmt::Debug for WaiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaiterRegistry")
            .field("pending", &self.ids())
            .finish()
    }
}
