//! Engine summary report.

use framekeeper_core::{ControlMode, ErrorRecord, FrameNumber, InstrumentationMode, Millis};
use serde::{Deserialize, Serialize};

/// Point-in-time overview of the engine for a controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSummary {
    pub mode: ControlMode,
    pub instrumentation: InstrumentationMode,
    /// Frames completed since construction or the last reset.
    pub frame_number: FrameNumber,
    /// Callbacks held by the engine.
    pub pending_callbacks: usize,
    /// Callbacks forwarded to the host and not yet executed.
    pub released_callbacks: usize,
    pub tape_len: usize,
    pub tape_capacity: usize,
    /// Records dropped from the tape by capacity eviction.
    pub frames_evicted: u64,
    pub event_log_len: usize,
    pub error_count: usize,
    pub snapshot_count: usize,
    pub snapshot_failures: u64,
    /// Mean frame duration over the summary window.
    pub average_frame_ms: Option<Millis>,
    pub fps: Option<f64>,
    pub recent_errors: Vec<ErrorRecord>,
    pub step_pending: bool,
}

/// Frames per second for a mean frame duration.
pub(crate) fn fps_from_average(average_ms: Option<Millis>) -> Option<f64> {
    average_ms.filter(|ms| *ms > 0.0).map(|ms| 1000.0 / ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_from_average() {
        assert_eq!(fps_from_average(Some(20.0)), Some(50.0));
        assert_eq!(fps_from_average(Some(0.0)), None);
        assert_eq!(fps_from_average(None), None);
    }
}
