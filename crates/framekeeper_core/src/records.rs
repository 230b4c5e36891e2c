//! Frame and error records

use crate::events::EventRecord;
use crate::{FrameNumber, Millis};
use serde::{Deserialize, Serialize};

/// Source position attached to an error, when known.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl ErrorLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A fault collected while the application was running.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<ErrorLocation>,
    pub frame_number: FrameNumber,
    pub timestamp: Millis,
}

/// Heap usage sampled at frame completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub used: u64,
    pub total: u64,
}

/// One executed frame. Immutable once appended to the tape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_number: FrameNumber,
    /// Timestamp the host passed to the frame's callbacks.
    pub timestamp: Millis,
    /// `timestamp` minus the previous frame's timestamp, zero for the first frame.
    pub duration_ms: Millis,
    /// Deep copy of the application state after the frame ran.
    pub state: Option<serde_json::Value>,
    /// Events delivered since the previous frame completed, in arrival order.
    pub events: Vec<EventRecord>,
    /// Errors tagged with this frame number.
    pub errors: Vec<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryMetrics>,
}

impl FrameRecord {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Extract a readable message from a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
