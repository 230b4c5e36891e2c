//! Headless host for testing.
//!
//! Provides a [`FrameHost`] without a window or display loop, useful for:
//! - Unit testing scheduling decisions
//! - Integration testing of control sequences
//! - CI pipelines
//!
//! Frames are presented and timers fired only when the test asks, and time
//! only moves through the shared [`ManualClock`].

use crate::host::{FrameCallback, FrameHost, HostHandle, TimerCallback};
use framekeeper_core::{Clock, ManualClock, Millis};
use parking_lot::Mutex;

struct Timer {
    due: Millis,
    seq: u64,
    callback: TimerCallback,
}

#[derive(Default)]
struct HostQueue {
    next_handle: u64,
    next_timer: u64,
    frames: Vec<(HostHandle, FrameCallback)>,
    timers: Vec<Timer>,
    /// Clock time of every frame request.
    request_log: Vec<Millis>,
    frames_presented: u64,
}

/// A manually driven host.
pub struct ManualHost {
    clock: ManualClock,
    queue: Mutex<HostQueue>,
}

impl ManualHost {
    /// Create a host that reads and advances `clock`.
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            queue: Mutex::new(HostQueue::default()),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Run every frame callback requested so far with the current time.
    ///
    /// Requests made while presenting wait for the next call. Returns the
    /// number of callbacks run.
    pub fn present_frame(&self) -> usize {
        let frames = {
            let mut queue = self.queue.lock();
            if !queue.frames.is_empty() {
                queue.frames_presented += 1;
            }
            std::mem::take(&mut queue.frames)
        };
        let timestamp = self.clock.now_ms();
        let count = frames.len();
        for (_, callback) in frames {
            callback(timestamp);
        }
        count
    }

    /// Advance the clock by `ms`, firing due timers in order.
    pub fn advance(&self, ms: Millis) {
        let target = self.clock.now_ms() + ms.max(0.0);
        loop {
            let next = {
                let mut queue = self.queue.lock();
                let due = queue
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)))
                    .map(|(idx, _)| idx);
                due.map(|idx| queue.timers.remove(idx))
            };
            let Some(timer) = next else { break };
            self.clock.seek(timer.due);
            (timer.callback)();
        }
        self.clock.seek(target);
    }

    /// Advance by `frame_ms` and present, `count` times. Returns the number
    /// of presents that ran at least one callback.
    pub fn run_frames(&self, count: usize, frame_ms: Millis) -> usize {
        (0..count)
            .filter(|_| {
                self.advance(frame_ms);
                self.present_frame() > 0
            })
            .count()
    }

    pub fn pending_frames(&self) -> usize {
        self.queue.lock().frames.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.queue.lock().timers.len()
    }

    /// Clock times at which frames were requested.
    pub fn request_log(&self) -> Vec<Millis> {
        self.queue.lock().request_log.clone()
    }

    pub fn frames_presented(&self) -> u64 {
        self.queue.lock().frames_presented
    }
}

impl FrameHost for ManualHost {
    fn request_frame(&self, callback: FrameCallback) -> HostHandle {
        let now = self.clock.now_ms();
        let mut queue = self.queue.lock();
        queue.next_handle += 1;
        let handle = HostHandle(queue.next_handle);
        queue.frames.push((handle, callback));
        queue.request_log.push(now);
        handle
    }

    fn set_timer(&self, delay_ms: Millis, callback: TimerCallback) {
        let due = self.clock.now_ms() + delay_ms.max(0.0);
        let mut queue = self.queue.lock();
        queue.next_timer += 1;
        let seq = queue.next_timer;
        queue.timers.push(Timer { due, seq, callback });
    }
}

impl std::fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualHost")
            .field("now_ms", &self.clock.now_ms())
            .field("pending_frames", &self.pending_frames())
            .field("pending_timers", &self.pending_timers())
            .finish()
    }
}
