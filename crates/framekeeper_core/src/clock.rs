//! Monotonic clock sources.
//!
//! The engine never reads wall time directly; every timestamp it records
//! comes from a [`Clock`]. Hosts driven by a real display use
//! [`SystemClock`], while tests and headless hosts use [`ManualClock`],
//! which only moves when told to.

use crate::Millis;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A source of monotonic timestamps in milliseconds.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the clock's origin.
    fn now_ms(&self) -> Millis;
}

/// Clock backed by [`Instant`], measured from construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A manually advanced clock for deterministic hosts and tests.
///
/// Clones share the same position, so a host and the engine can hold
/// separate handles to one timeline. Time is stored in whole microseconds.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock positioned at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock positioned at `ms`.
    pub fn starting_at(ms: Millis) -> Self {
        let clock = Self::new();
        clock.seek(ms);
        clock
    }

    /// Move the clock forward by `ms`. Negative or non-finite amounts are ignored.
    pub fn advance(&self, ms: Millis) {
        if !ms.is_finite() || ms <= 0.0 {
            return;
        }
        self.micros.fetch_add(to_micros(ms), Ordering::SeqCst);
    }

    /// Jump to an absolute position. The clock never moves backwards.
    pub fn seek(&self, ms: Millis) {
        if !ms.is_finite() {
            return;
        }
        self.micros.fetch_max(to_micros(ms.max(0.0)), Ordering::SeqCst);
    }

    /// Current position in microseconds.
    pub fn as_micros(&self) -> u64 {
        self.micros.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.as_micros() as f64 / 1000.0
    }
}

fn to_micros(ms: Millis) -> u64 {
    (ms * 1000.0).round() as u64
}
