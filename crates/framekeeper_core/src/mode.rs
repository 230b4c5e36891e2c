//! Control state machine
//!
//! The controller-facing modes of the frame scheduler and the transitions
//! between them. The machine is flat and single-writer: every
//! [`ControlEvent`] is applied completely before `send` returns.

use crate::Millis;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of mode changes kept for debugging.
const HISTORY_LIMIT: usize = 64;

/// How the frame scheduler treats queued callbacks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ControlMode {
    /// Callbacks are released to the host as soon as they are queued.
    #[default]
    Running,
    /// Callbacks accumulate and are not released.
    Paused,
    /// Released like `Running`; reverts to `Paused` after `remaining` frames.
    Stepping { remaining: u32 },
    /// Releases are spaced at least `1000 / fps` milliseconds apart.
    SlowMotion { fps: f64 },
}

impl ControlMode {
    pub fn is_running(&self) -> bool {
        matches!(self, ControlMode::Running)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, ControlMode::Paused)
    }

    pub fn is_stepping(&self) -> bool {
        matches!(self, ControlMode::Stepping { .. })
    }

    /// The slow motion rate, if slow motion is active.
    pub fn slow_motion_fps(&self) -> Option<f64> {
        match self {
            ControlMode::SlowMotion { fps } => Some(*fps),
            _ => None,
        }
    }

    /// How long a release must wait, given the time since the previous release.
    ///
    /// `None` means the queue is held indefinitely. A release that has never
    /// happened before is never delayed.
    pub fn release_delay(&self, since_last_release: Option<Millis>) -> Option<Millis> {
        match self {
            ControlMode::Paused => None,
            ControlMode::Running | ControlMode::Stepping { .. } => Some(0.0),
            ControlMode::SlowMotion { fps } => {
                let Some(elapsed) = since_last_release else {
                    return Some(0.0);
                };
                Some((1000.0 / fps - elapsed).max(0.0))
            }
        }
    }

    /// Short human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            ControlMode::Running => "running",
            ControlMode::Paused => "paused",
            ControlMode::Stepping { .. } => "stepping",
            ControlMode::SlowMotion { .. } => "slow_motion",
        }
    }
}

/// Whether the controller's instrumentation is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentationMode {
    /// An automated controller is driving the application; overlays are shown.
    Agent,
    /// A human is in control; all control modes are back at defaults.
    #[default]
    User,
}

impl InstrumentationMode {
    pub fn is_active(&self) -> bool {
        matches!(self, InstrumentationMode::Agent)
    }
}

/// Inputs to the control state machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlEvent {
    Pause,
    Resume,
    /// Release this many frames, then pause. Zero leaves the mode unchanged.
    Step(u32),
    /// Enter slow motion. Non-finite or non-positive rates are ignored.
    SlowMotion(f64),
    ClearSlowMotion,
    /// A released batch finished executing.
    FrameCompleted,
    Reset,
}

/// A mode change produced by [`ControlMachine::send`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub from: ControlMode,
    pub event: ControlEvent,
    pub to: ControlMode,
}

impl Transition {
    /// Whether this transition ended a step sequence.
    pub fn step_exhausted(&self) -> bool {
        self.from.is_stepping() && self.to.is_paused() && self.event == ControlEvent::FrameCompleted
    }

    /// Whether the mode actually changed.
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// The control state machine.
#[derive(Debug, Default)]
pub struct ControlMachine {
    mode: ControlMode,
    /// Recent mode changes (for debugging)
    history: VecDeque<Transition>,
}

impl ControlMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current mode
    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Recent mode changes, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Transition> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Apply an event and return the resulting transition.
    pub fn send(&mut self, event: ControlEvent) -> Transition {
        let from = self.mode;
        let to = Self::next(from, event);
        self.mode = to;

        let transition = Transition { from, event, to };
        if transition.changed() {
            tracing::debug!(
                "control mode {} -> {} on {:?}",
                from.label(),
                to.label(),
                event
            );
            if self.history.len() == HISTORY_LIMIT {
                self.history.pop_front();
            }
            self.history.push_back(transition);
        }
        transition
    }

    fn next(from: ControlMode, event: ControlEvent) -> ControlMode {
        match event {
            ControlEvent::Pause => ControlMode::Paused,
            ControlEvent::Resume | ControlEvent::ClearSlowMotion | ControlEvent::Reset => {
                ControlMode::Running
            }
            ControlEvent::Step(0) => from,
            ControlEvent::Step(remaining) => ControlMode::Stepping { remaining },
            ControlEvent::SlowMotion(fps) if fps.is_finite() && fps > 0.0 => {
                ControlMode::SlowMotion { fps }
            }
            ControlEvent::SlowMotion(_) => from,
            ControlEvent::FrameCompleted => match from {
                ControlMode::Stepping { remaining } if remaining <= 1 => ControlMode::Paused,
                ControlMode::Stepping { remaining } => ControlMode::Stepping {
                    remaining: remaining - 1,
                },
                other => other,
            },
        }
    }
}
