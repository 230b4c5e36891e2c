//! Host collaborators
//!
//! The engine never owns a display loop. It asks a [`FrameHost`] for the
//! next frame (the host's native next-frame primitive) and for timers, and
//! notifies an optional [`OverlayHook`] when instrumentation toggles.

use framekeeper_core::{FrameRecord, Millis};

/// Callback run by the host on its next frame, with the frame timestamp.
pub type FrameCallback = Box<dyn FnOnce(Millis) + Send>;

/// Callback run by the host when a timer elapses.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// Identifier the host returns for a frame request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u64);

/// The application's native frame scheduling primitive.
///
/// Implementations must not invoke callbacks synchronously from inside
/// `request_frame` or `set_timer`; they run later, from the host's loop.
pub trait FrameHost: Send + Sync {
    /// Run `callback` on the next frame.
    fn request_frame(&self, callback: FrameCallback) -> HostHandle;

    /// Run `callback` once `delay_ms` has elapsed.
    fn set_timer(&self, delay_ms: Millis, callback: TimerCallback);
}

/// External overlay/panel renderer.
///
/// Called without any engine lock held, but implementations must not call
/// back into the engine's collaborator registration methods.
pub trait OverlayHook: Send {
    /// Instrumentation switched on (agent mode).
    fn on_activate(&mut self) {}

    /// Instrumentation switched off (user mode).
    fn on_deactivate(&mut self) {}

    /// A frame was recorded while instrumentation is active.
    fn on_frame(&mut self, _record: &FrameRecord) {}
}
