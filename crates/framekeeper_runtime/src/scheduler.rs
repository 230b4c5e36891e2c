//! Frame callback queue
//!
//! Holds callbacks the application asked to run "next frame". Callbacks are
//! either pending (held by the engine) or released (forwarded to the host
//! and waiting for its next frame). Both lists keep enqueue order.

use crate::host::FrameCallback;
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Handle returned by [`FrameEngine::schedule`](crate::FrameEngine::schedule).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(pub u64);

/// A queued frame callback.
pub(crate) struct PendingCallback {
    pub(crate) id: CallbackHandle,
    pub(crate) callback: FrameCallback,
}

/// Callbacks released together and executed as one frame.
pub(crate) type Batch = SmallVec<[PendingCallback; 8]>;

#[derive(Default)]
pub(crate) struct CallbackQueue {
    next_id: u64,
    pending: VecDeque<PendingCallback>,
    released: Vec<PendingCallback>,
}

impl CallbackQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a callback as pending and return its handle.
    pub(crate) fn enqueue(&mut self, callback: FrameCallback) -> CallbackHandle {
        self.next_id += 1;
        let id = CallbackHandle(self.next_id);
        self.pending.push_back(PendingCallback { id, callback });
        id
    }

    /// Move every pending callback to the released list.
    pub(crate) fn release_all(&mut self) -> usize {
        let count = self.pending.len();
        self.released.extend(self.pending.drain(..));
        count
    }

    /// Take the released callbacks for execution.
    pub(crate) fn take_released(&mut self) -> Batch {
        self.released.drain(..).collect()
    }

    /// Withdraw a callback that has not executed yet.
    pub(crate) fn cancel(&mut self, handle: CallbackHandle) -> bool {
        if let Some(idx) = self.pending.iter().position(|p| p.id == handle) {
            self.pending.remove(idx);
            return true;
        }
        if let Some(idx) = self.released.iter().position(|p| p.id == handle) {
            self.released.remove(idx);
            return true;
        }
        false
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn released_len(&self) -> usize {
        self.released.len()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
