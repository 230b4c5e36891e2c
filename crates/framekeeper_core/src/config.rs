//! Engine configuration
//!
//! Knobs are read from TOML (`framekeeper.toml`) or built in code, and can
//! be merged at runtime through a [`ConfigPatch`]:
//!
//! ```toml
//! tape_capacity = 300
//! snapshot_stride = 4
//! default_slow_motion_fps = 5.0
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Capacity, sampling and timing knobs for the engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of frame records kept on the tape
    #[serde(default = "default_tape_capacity")]
    pub tape_capacity: usize,
    /// Maximum number of events kept in the rolling event log
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
    /// Maximum number of visual snapshots kept
    #[serde(default = "default_snapshot_capacity")]
    pub snapshot_capacity: usize,
    /// Capture a visual snapshot every N completed frames
    #[serde(default = "default_snapshot_stride")]
    pub snapshot_stride: u64,
    #[serde(default = "default_snapshot_max_width")]
    pub snapshot_max_width: u32,
    #[serde(default = "default_snapshot_max_height")]
    pub snapshot_max_height: u32,
    /// Rate used when slow motion is requested without an explicit rate
    #[serde(default = "default_slow_motion_fps")]
    pub default_slow_motion_fps: f64,
    /// Upper bound on how long a step wait may stay unresolved
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,
    /// Number of recent frames averaged in the summary
    #[serde(default = "default_summary_window")]
    pub summary_window: usize,
    /// Number of recent errors included in the summary
    #[serde(default = "default_recent_error_count")]
    pub recent_error_count: usize,
}

fn default_tape_capacity() -> usize {
    600
}

fn default_event_log_capacity() -> usize {
    1000
}

fn default_snapshot_capacity() -> usize {
    60
}

fn default_snapshot_stride() -> u64 {
    1
}

fn default_snapshot_max_width() -> u32 {
    160
}

fn default_snapshot_max_height() -> u32 {
    120
}

fn default_slow_motion_fps() -> f64 {
    10.0
}

fn default_step_timeout_ms() -> u64 {
    5000
}

fn default_summary_window() -> usize {
    60
}

fn default_recent_error_count() -> usize {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tape_capacity: default_tape_capacity(),
            event_log_capacity: default_event_log_capacity(),
            snapshot_capacity: default_snapshot_capacity(),
            snapshot_stride: default_snapshot_stride(),
            snapshot_max_width: default_snapshot_max_width(),
            snapshot_max_height: default_snapshot_max_height(),
            default_slow_motion_fps: default_slow_motion_fps(),
            step_timeout_ms: default_step_timeout_ms(),
            summary_window: default_summary_window(),
            recent_error_count: default_recent_error_count(),
        }
    }
}

impl EngineConfig {
    /// Small buffers, for tests.
    pub fn minimal() -> Self {
        Self {
            tape_capacity: 16,
            event_log_capacity: 32,
            snapshot_capacity: 4,
            ..Default::default()
        }
    }

    pub fn with_tape_capacity(mut self, capacity: usize) -> Self {
        self.tape_capacity = capacity;
        self
    }

    pub fn with_event_log_capacity(mut self, capacity: usize) -> Self {
        self.event_log_capacity = capacity;
        self
    }

    pub fn with_snapshots(mut self, capacity: usize, stride: u64) -> Self {
        self.snapshot_capacity = capacity;
        self.snapshot_stride = stride;
        self
    }

    pub fn with_step_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.step_timeout_ms = timeout_ms;
        self
    }

    /// Parse from TOML text and validate.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, or from `framekeeper.toml` inside a directory.
    pub fn load(path: &Path) -> Result<Self> {
        let config_path = if path.is_dir() {
            path.join("framekeeper.toml")
        } else {
            path.to_path_buf()
        };
        let content = fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.tape_capacity == 0 {
            return Err(Error::InvalidConfig("tape_capacity must be at least 1".into()));
        }
        if self.event_log_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_log_capacity must be at least 1".into(),
            ));
        }
        if self.snapshot_capacity == 0 {
            return Err(Error::InvalidConfig(
                "snapshot_capacity must be at least 1".into(),
            ));
        }
        if self.snapshot_stride == 0 {
            return Err(Error::InvalidConfig("snapshot_stride must be at least 1".into()));
        }
        if self.snapshot_max_width == 0 || self.snapshot_max_height == 0 {
            return Err(Error::InvalidConfig(
                "snapshot resolution must be non-zero".into(),
            ));
        }
        if !self.default_slow_motion_fps.is_finite() || self.default_slow_motion_fps <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "default_slow_motion_fps must be positive, got {}",
                self.default_slow_motion_fps
            )));
        }
        if self.summary_window == 0 {
            return Err(Error::InvalidConfig("summary_window must be at least 1".into()));
        }
        Ok(())
    }

    /// Apply every knob set in `patch`, returning the merged configuration.
    pub fn merged(&self, patch: &ConfigPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.tape_capacity {
            next.tape_capacity = v;
        }
        if let Some(v) = patch.event_log_capacity {
            next.event_log_capacity = v;
        }
        if let Some(v) = patch.snapshot_capacity {
            next.snapshot_capacity = v;
        }
        if let Some(v) = patch.snapshot_stride {
            next.snapshot_stride = v;
        }
        if let Some(v) = patch.snapshot_max_width {
            next.snapshot_max_width = v;
        }
        if let Some(v) = patch.snapshot_max_height {
            next.snapshot_max_height = v;
        }
        if let Some(v) = patch.default_slow_motion_fps {
            next.default_slow_motion_fps = v;
        }
        if let Some(v) = patch.step_timeout_ms {
            next.step_timeout_ms = v;
        }
        if let Some(v) = patch.summary_window {
            next.summary_window = v;
        }
        if let Some(v) = patch.recent_error_count {
            next.recent_error_count = v;
        }
        next
    }
}

/// A partial configuration; unset fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub tape_capacity: Option<usize>,
    pub event_log_capacity: Option<usize>,
    pub snapshot_capacity: Option<usize>,
    pub snapshot_stride: Option<u64>,
    pub snapshot_max_width: Option<u32>,
    pub snapshot_max_height: Option<u32>,
    pub default_slow_motion_fps: Option<f64>,
    pub step_timeout_ms: Option<u64>,
    pub summary_window: Option<usize>,
    pub recent_error_count: Option<usize>,
}
