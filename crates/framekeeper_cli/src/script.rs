//! Control script handling
//!
//! A script is a TOML file of timed controller commands:
//!
//! ```toml
//! duration_ms = 3000
//! frame_interval_ms = 16
//!
//! [[command]]
//! at_ms = 500
//! op = "pause"
//!
//! [[command]]
//! at_ms = 800
//! op = "step"
//! frames = 3
//! ```

use anyhow::{Context, Result};
use framekeeper_core::{ConfigPatch, EventData, InstrumentationMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A parsed control script (script.toml)
#[derive(Debug, Deserialize, Serialize)]
pub struct Script {
    /// How long the demo runs, in milliseconds
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    /// Host frame interval
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default, rename = "command")]
    pub commands: Vec<Command>,
}

fn default_duration_ms() -> u64 {
    3000
}

fn default_frame_interval_ms() -> u64 {
    16
}

/// One timed controller command
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Command {
    /// Milliseconds after start
    pub at_ms: u64,
    #[serde(flatten)]
    pub op: Op,
}

/// Controller operations available to scripts
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Pause,
    Resume,
    Step {
        #[serde(default = "default_step_frames")]
        frames: u32,
    },
    /// Without `fps`, the configured default rate is used
    SlowMotion {
        #[serde(default)]
        fps: Option<f64>,
    },
    ClearSlowMotion,
    Mode {
        mode: InstrumentationMode,
    },
    Event {
        event: EventData,
    },
    SetState {
        patch: Value,
    },
    Error {
        message: String,
    },
    Config {
        patch: ConfigPatch,
    },
    Reset,
}

fn default_step_frames() -> u32 {
    1
}

impl Script {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut script: Script = toml::from_str(content)?;
        if script.frame_interval_ms == 0 {
            anyhow::bail!("frame_interval_ms must be at least 1");
        }
        // Commands run in time order; equal times keep file order.
        script.commands.sort_by_key(|c| c.at_ms);
        for command in &script.commands {
            if command.at_ms > script.duration_ms {
                tracing::warn!(
                    "command {:?} at {}ms is after the end of the run ({}ms)",
                    command.op,
                    command.at_ms,
                    script.duration_ms
                );
            }
        }
        Ok(script)
    }

    /// Load a script file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}
