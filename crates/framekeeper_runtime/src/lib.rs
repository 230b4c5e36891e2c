//! framekeeper Runtime
//!
//! The frame control engine. Applications route their "run this next frame"
//! requests through a [`FrameEngine`], which forwards them to the host's
//! native frame primitive as the controller allows:
//!
//! - **Scheduling**: pause, resume, exact single-stepping and slow motion
//! - **Recording**: one [`FrameRecord`] per executed frame with state, events and errors
//! - **Fault isolation**: panicking callbacks are recorded, their siblings keep running
//! - **Headless testing**: [`testing::ManualHost`] drives frames and timers by hand
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use framekeeper_core::{ControlMode, EngineConfig, ManualClock};
//! use framekeeper_runtime::{testing::ManualHost, FrameEngine};
//!
//! let clock = ManualClock::new();
//! let host = Arc::new(ManualHost::new(clock.clone()));
//! let engine = FrameEngine::new(host.clone(), Arc::new(clock), EngineConfig::default()).unwrap();
//!
//! engine.pause();
//! engine.schedule(|_timestamp| { /* animate */ });
//! host.present_frame();
//! assert_eq!(engine.frame_number(), 0);
//!
//! engine.step_sync(1);
//! host.present_frame();
//! assert_eq!(engine.frame_number(), 1);
//! assert_eq!(engine.mode(), ControlMode::Paused);
//! ```
//!
//! [`FrameRecord`]: framekeeper_core::FrameRecord

pub mod engine;
pub mod fault;
pub mod host;
pub mod scheduler;
pub mod step;
pub mod summary;
pub mod testing;

pub use engine::FrameEngine;
pub use fault::install_panic_hook;
pub use host::{FrameCallback, FrameHost, HostHandle, OverlayHook, TimerCallback};
pub use scheduler::CallbackHandle;
pub use step::{StepOutcome, StepStatus, StepWaiter};
pub use summary::EngineSummary;
