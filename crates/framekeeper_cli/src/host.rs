//! Real-time host backed by a tokio interval.

use framekeeper_core::{Clock, Millis};
use framekeeper_runtime::{FrameCallback, FrameHost, HostHandle, TimerCallback};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;

/// Presents a frame every interval, like a display's vsync.
pub struct IntervalHost {
    clock: Arc<dyn Clock>,
    runtime: Handle,
    frames: Mutex<Vec<FrameCallback>>,
    next_handle: AtomicU64,
    presented: AtomicU64,
}

impl IntervalHost {
    /// Must be called from within a tokio runtime.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            runtime: Handle::current(),
            frames: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(0),
            presented: AtomicU64::new(0),
        }
    }

    /// Present frames every `interval` until the task is aborted.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.present();
        }
    }

    fn present(&self) {
        let frames = std::mem::take(&mut *self.frames.lock());
        if frames.is_empty() {
            return;
        }
        self.presented.fetch_add(1, Ordering::Relaxed);
        let timestamp = self.clock.now_ms();
        for callback in frames {
            callback(timestamp);
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }
}

impl FrameHost for IntervalHost {
    fn request_frame(&self, callback: FrameCallback) -> HostHandle {
        self.frames.lock().push(callback);
        HostHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn set_timer(&self, delay_ms: Millis, callback: TimerCallback) {
        let delay = Duration::from_secs_f64(delay_ms.max(0.0) / 1000.0);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
    }
}
