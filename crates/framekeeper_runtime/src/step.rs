//! Step waits
//!
//! `step(n)` hands back a [`StepWaiter`]. The wait has two arms, the
//! completion channel fed by the engine and a timeout. Whichever fires
//! first wins; the other is invalidated through the wait's ticket.

use crate::engine::FrameEngine;
use framekeeper_core::FrameNumber;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// How a step wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The requested number of frames ran.
    Completed,
    /// The frames did not run before the step timeout.
    TimedOut,
    /// A later control operation replaced the step before it finished.
    Superseded,
}

/// Result of a step wait.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Completed frame count when the wait resolved.
    pub frame_number: FrameNumber,
    pub state: Option<Value>,
    pub status: StepStatus,
}

impl StepOutcome {
    pub fn timed_out(&self) -> bool {
        self.status == StepStatus::TimedOut
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// The engine's side of an outstanding step wait.
pub(crate) struct PendingStep {
    pub(crate) ticket: u64,
    pub(crate) tx: oneshot::Sender<StepOutcome>,
}

impl PendingStep {
    pub(crate) fn resolve(self, outcome: StepOutcome) {
        // The waiter may have been dropped; nobody is listening then.
        let _ = self.tx.send(outcome);
    }
}

enum WaitState {
    Ready(StepOutcome),
    Pending {
        ticket: u64,
        rx: oneshot::Receiver<StepOutcome>,
    },
}

/// Future-like handle for a `step(n)` call.
pub struct StepWaiter {
    engine: FrameEngine,
    state: WaitState,
    deadline: Instant,
}

impl StepWaiter {
    pub(crate) fn ready(engine: FrameEngine, outcome: StepOutcome) -> Self {
        Self {
            engine,
            state: WaitState::Ready(outcome),
            deadline: Instant::now(),
        }
    }

    pub(crate) fn pending(
        engine: FrameEngine,
        ticket: u64,
        rx: oneshot::Receiver<StepOutcome>,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            state: WaitState::Pending { ticket, rx },
            deadline: Instant::now() + timeout,
        }
    }

    /// Wait for the step to finish or time out.
    pub async fn wait(self) -> StepOutcome {
        let engine = self.engine;
        let (ticket, mut rx) = match self.state {
            WaitState::Ready(outcome) => return outcome,
            WaitState::Pending { ticket, rx } => (ticket, rx),
        };

        tokio::select! {
            result = &mut rx => {
                result.unwrap_or_else(|_| engine.current_outcome(StepStatus::Superseded))
            }
            _ = tokio::time::sleep_until(self.deadline) => {
                match engine.expire_step(ticket) {
                    Some(outcome) => outcome,
                    // The engine resolved the wait in the meantime.
                    None => rx
                        .await
                        .unwrap_or_else(|_| engine.current_outcome(StepStatus::Superseded)),
                }
            }
        }
    }

    /// Non-blocking check. Returns the outcome once the engine resolved it.
    pub fn try_outcome(&mut self) -> Option<StepOutcome> {
        if let WaitState::Pending { rx, .. } = &mut self.state {
            let outcome = rx.try_recv().ok()?;
            self.state = WaitState::Ready(outcome);
        }
        match &self.state {
            WaitState::Ready(outcome) => Some(outcome.clone()),
            WaitState::Pending { .. } => None,
        }
    }
}

impl std::fmt::Debug for StepWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolved = matches!(self.state, WaitState::Ready(_));
        f.debug_struct("StepWaiter")
            .field("resolved", &resolved)
            .field("deadline", &self.deadline)
            .finish()
    }
}
