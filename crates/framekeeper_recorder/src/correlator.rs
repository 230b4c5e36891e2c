//! Event and error correlation.
//!
//! Input events are stamped with the open frame number the moment they are
//! delivered. They wait in a pending buffer until the frame completes and
//! are then drained, in arrival order, into that frame's record. A separate
//! rolling log keeps recent events for quick inspection regardless of how
//! much of the tape is retained.

use framekeeper_core::{
    ErrorLocation, ErrorRecord, EventData, EventError, EventRecord, FrameNumber, Millis,
};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct EventCorrelator {
    /// Events delivered since the last frame completed.
    pending: Vec<EventRecord>,
    /// Rolling log of recent events.
    log: VecDeque<EventRecord>,
    log_capacity: usize,
    /// Every collected error, until cleared.
    errors: Vec<ErrorRecord>,
}

impl EventCorrelator {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            log: VecDeque::new(),
            log_capacity: log_capacity.max(1),
            errors: Vec::new(),
        }
    }

    /// Validate and record an input event delivered during `frame`.
    pub fn record_event(
        &mut self,
        frame: FrameNumber,
        timestamp: Millis,
        data: EventData,
    ) -> Result<EventRecord, EventError> {
        data.validate()?;
        let record = EventRecord {
            frame_number: frame,
            timestamp,
            data,
        };
        self.pending.push(record.clone());
        self.log.push_back(record.clone());
        self.trim_log();
        Ok(record)
    }

    /// Take every event delivered since the previous drain.
    pub fn drain_pending(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The last `n` logged events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<EventRecord> {
        let skip = self.log.len().saturating_sub(n);
        self.log.iter().skip(skip).cloned().collect()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    pub fn set_log_capacity(&mut self, capacity: usize) {
        self.log_capacity = capacity.max(1);
        self.trim_log();
    }

    fn trim_log(&mut self) {
        while self.log.len() > self.log_capacity {
            self.log.pop_front();
        }
    }

    /// Record a fault attributed to `frame`.
    pub fn record_error(
        &mut self,
        frame: FrameNumber,
        timestamp: Millis,
        message: impl Into<String>,
        location: Option<ErrorLocation>,
    ) -> ErrorRecord {
        let record = ErrorRecord {
            message: message.into(),
            location,
            frame_number: frame,
            timestamp,
        };
        self.errors.push(record.clone());
        record
    }

    /// Errors attributed to exactly `frame`.
    pub fn errors_for(&self, frame: FrameNumber) -> Vec<ErrorRecord> {
        self.errors
            .iter()
            .filter(|e| e.frame_number == frame)
            .cloned()
            .collect()
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// The last `n` errors, oldest first.
    pub fn recent_errors(&self, n: usize) -> Vec<ErrorRecord> {
        let skip = self.errors.len().saturating_sub(n);
        self.errors[skip..].to_vec()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Drop pending events, the log and all errors.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.log.clear();
        self.errors.clear();
    }
}

impl Default for EventCorrelator {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer(x: f32) -> EventData {
        EventData::PointerMove { x, y: 0.0 }
    }

    #[test]
    fn test_drain_returns_arrival_order_once() {
        let mut correlator = EventCorrelator::new(10);
        correlator.record_event(1, 1.0, pointer(1.0)).unwrap();
        correlator.record_event(1, 2.0, pointer(2.0)).unwrap();

        let drained = correlator.drain_pending();
        let xs: Vec<_> = drained
            .iter()
            .map(|e| match e.data {
                EventData::PointerMove { x, .. } => x,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(xs, vec![1.0, 2.0]);
        assert!(correlator.drain_pending().is_empty());
        assert_eq!(correlator.log_len(), 2);
    }

    #[test]
    fn test_invalid_event_not_recorded() {
        let mut correlator = EventCorrelator::new(10);
        let result = correlator.record_event(1, 1.0, pointer(f32::NAN));
        assert_eq!(result, Err(EventError::NonFinite("x")));
        assert_eq!(correlator.pending_len(), 0);
        assert_eq!(correlator.log_len(), 0);
    }

    #[test]
    fn test_log_is_capped_independently_of_pending() {
        let mut correlator = EventCorrelator::new(3);
        for i in 0..5 {
            correlator.record_event(1, i as f64, pointer(i as f32)).unwrap();
        }
        assert_eq!(correlator.log_len(), 3);
        assert_eq!(correlator.pending_len(), 5);

        let recent = correlator.recent_events(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].timestamp, 4.0);
    }

    #[test]
    fn test_errors_filtered_by_frame() {
        let mut correlator = EventCorrelator::new(3);
        correlator.record_error(1, 0.0, "first", None);
        correlator.record_error(2, 1.0, "second", Some(ErrorLocation::new("a.rs", 1, 1)));
        correlator.record_error(2, 2.0, "third", None);

        let for_two = correlator.errors_for(2);
        assert_eq!(for_two.len(), 2);
        assert_eq!(for_two[0].message, "second");
        assert_eq!(correlator.recent_errors(1)[0].message, "third");

        correlator.clear_errors();
        assert!(correlator.errors().is_empty());
    }
}
