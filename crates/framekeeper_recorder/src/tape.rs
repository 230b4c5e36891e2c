//! Frame tape: the bounded history of completed frames.

use framekeeper_core::{FrameNumber, FrameRecord, Millis};
use std::collections::VecDeque;

/// Ring buffer of frame records in increasing frame order.
#[derive(Debug, Clone)]
pub struct FrameTape {
    records: VecDeque<FrameRecord>,
    capacity: usize,
    /// Records dropped by eviction since the last clear.
    evicted: u64,
}

impl FrameTape {
    /// Create an empty tape. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Append a record, evicting the oldest ones past capacity.
    pub fn push(&mut self, record: FrameRecord) {
        debug_assert!(
            self.records
                .back()
                .map_or(true, |last| last.frame_number < record.frame_number),
            "frame numbers must increase"
        );
        self.records.push_back(record);
        self.evict();
    }

    /// Change the capacity, trimming the oldest records if it shrank.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.evict();
    }

    fn evict(&mut self) {
        while self.records.len() > self.capacity {
            self.records.pop_front();
            self.evicted += 1;
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.evicted = 0;
    }

    pub fn latest(&self) -> Option<&FrameRecord> {
        self.records.back()
    }

    /// Find a retained record by frame number.
    pub fn get(&self, frame: FrameNumber) -> Option<&FrameRecord> {
        let idx = self
            .records
            .binary_search_by_key(&frame, |r| r.frame_number)
            .ok()?;
        self.records.get(idx)
    }

    /// Retained records with `from <= frame_number <= to`.
    pub fn range(&self, from: FrameNumber, to: FrameNumber) -> Vec<FrameRecord> {
        self.records
            .iter()
            .filter(|r| r.frame_number >= from && r.frame_number <= to)
            .cloned()
            .collect()
    }

    /// The last `n` records, oldest first.
    pub fn last(&self, n: usize) -> Vec<FrameRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameRecord> {
        self.records.iter()
    }

    /// Mean frame duration over the last `window` records, skipping the
    /// first frame after a reset (which has no predecessor).
    pub fn average_duration(&self, window: usize) -> Option<Millis> {
        let skip = self.records.len().saturating_sub(window);
        let (sum, count) = self
            .records
            .iter()
            .skip(skip)
            .filter(|r| r.duration_ms > 0.0)
            .fold((0.0, 0usize), |(sum, count), r| (sum + r.duration_ms, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }
}

impl Default for FrameTape {
    fn default() -> Self {
        Self::new(600)
    }
}
