//! Bounded recording infrastructure for framekeeper.
//!
//! This crate holds everything the engine remembers about past frames:
//!
//! - [`FrameTape`] - ring buffer of completed [`FrameRecord`]s
//! - [`EventCorrelator`] - pending input events, the rolling event log and the error list
//! - [`SnapshotBuffer`] - ring buffer of low-resolution visual captures
//! - [`StateBridge`] - fault-tolerant access to application state
//!
//! Every buffer evicts its oldest entries first once its capacity is exceeded.
//!
//! [`FrameRecord`]: framekeeper_core::FrameRecord

mod capture;
mod correlator;
mod memory;
mod snapshot;
mod state;
mod tape;

pub use capture::RgbaFrame;
pub use correlator::EventCorrelator;
pub use memory::{FnMemoryProbe, MemoryProbe};
pub use snapshot::{
    CaptureError, EncodedImage, ImageFormat, SnapshotBuffer, SurfaceCapture, VisualSnapshot,
};
pub use state::{serialize_state, FnStateAccessor, StateAccessor, StateBridge, StateError};
pub use tape::FrameTape;
