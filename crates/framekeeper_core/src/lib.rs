//! framekeeper Core
//!
//! Shared vocabulary for the frame control and recording engine:
//!
//! - **Control Modes**: the Running / Paused / Stepping / SlowMotion state machine
//! - **Records**: frame, event and error records correlated to frame numbers
//! - **Clocks**: monotonic timestamp sources, including a manual clock for tests
//! - **Configuration**: runtime-mergeable capacity and sampling knobs
//!
//! # Example
//!
//! ```rust
//! use framekeeper_core::mode::{ControlEvent, ControlMachine, ControlMode};
//!
//! let mut machine = ControlMachine::new();
//! machine.send(ControlEvent::Pause);
//! machine.send(ControlEvent::Step(2));
//! assert_eq!(machine.mode(), ControlMode::Stepping { remaining: 2 });
//!
//! machine.send(ControlEvent::FrameCompleted);
//! machine.send(ControlEvent::FrameCompleted);
//! assert_eq!(machine.mode(), ControlMode::Paused);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod mode;
pub mod records;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigPatch, EngineConfig};
pub use error::{Error, Result};
pub use events::{EventData, EventError, EventRecord, Modifiers, PointerButton};
pub use mode::{ControlEvent, ControlMachine, ControlMode, InstrumentationMode, Transition};
pub use records::{panic_message, ErrorLocation, ErrorRecord, FrameRecord, MemoryMetrics};

/// Frame numbers are monotonic and start at zero after construction or reset.
pub type FrameNumber = u64;

/// Timestamps are milliseconds on the engine's monotonic clock.
pub type Millis = f64;
