//! framekeeper CLI
//!
//! Runs a small animated demo under the frame control engine and drives it
//! with a scripted controller, then reports what the engine recorded.

mod demo;
mod host;
mod script;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use framekeeper_core::{EngineConfig, EventRecord, FrameRecord, SystemClock};
use framekeeper_runtime::{install_panic_hook, EngineSummary, FrameEngine, StepOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::host::IntervalHost;
use crate::script::{Op, Script};

#[derive(Parser)]
#[command(name = "framekeeper")]
#[command(author, version, about = "Frame-exact control and recording for interactive applications")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo application under a control script
    Run(RunArgs),

    /// Print the default engine configuration as TOML
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a control script and list its commands
    Check {
        /// Script file
        script: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Control script (TOML)
    script: PathBuf,

    /// Engine configuration file or directory containing framekeeper.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Include the full frame tape in the report
    #[arg(long)]
    tape: bool,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// What a run prints when it finishes.
#[derive(Serialize)]
struct Report {
    summary: EngineSummary,
    steps: Vec<StepOutcome>,
    events: Vec<EventRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<Vec<FrameRecord>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Config { output } => cmd_config(output.as_deref()),
        Commands::Check { script } => cmd_check(&script),
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let script = Script::load(&args.script)?;
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load engine config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let clock = Arc::new(SystemClock::new());
    let host = Arc::new(IntervalHost::new(clock.clone()));
    let engine = FrameEngine::new(host.clone(), clock, config)?;
    install_panic_hook(&engine);
    demo::attach(&engine);

    let frame_loop = tokio::spawn(
        host.clone()
            .run(Duration::from_millis(script.frame_interval_ms)),
    );

    info!(
        "running {} commands over {}ms",
        script.commands.len(),
        script.duration_ms
    );
    let start = Instant::now();
    let mut steps: Vec<JoinHandle<StepOutcome>> = Vec::new();

    for command in script.commands {
        tokio::time::sleep_until(start + Duration::from_millis(command.at_ms)).await;
        info!("t={}ms {:?}", command.at_ms, command.op);
        if let Some(step) = execute(&engine, command.op) {
            steps.push(step);
        }
    }
    tokio::time::sleep_until(start + Duration::from_millis(script.duration_ms)).await;

    let mut outcomes = Vec::with_capacity(steps.len());
    for step in steps {
        outcomes.push(step.await.context("step wait task failed")?);
    }
    frame_loop.abort();

    let summary = engine.summary();
    info!(
        "finished: {} frames in {} host presents, mode {}",
        summary.frame_number,
        host.frames_presented(),
        summary.mode.label()
    );

    let report = Report {
        events: engine.event_log(usize::MAX),
        frames: args.tape.then(|| engine.last_frames(usize::MAX)),
        steps: outcomes,
        summary,
    };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    write_output(args.output.as_deref(), &json)
}

/// Apply one scripted operation. Step waits continue in the background.
fn execute(engine: &FrameEngine, op: Op) -> Option<JoinHandle<StepOutcome>> {
    match op {
        Op::Pause => engine.pause(),
        Op::Resume => engine.resume(),
        Op::Step { frames } => {
            let waiter = engine.step(frames);
            return Some(tokio::spawn(async move {
                let outcome = waiter.wait().await;
                info!(
                    "step finished at frame {} ({:?})",
                    outcome.frame_number, outcome.status
                );
                outcome
            }));
        }
        Op::SlowMotion { fps: Some(fps) } => {
            if let Err(e) = engine.set_slow_motion(fps) {
                warn!("{}", e);
            }
        }
        Op::SlowMotion { fps: None } => engine.set_slow_motion_default(),
        Op::ClearSlowMotion => engine.clear_slow_motion(),
        Op::Mode { mode } => engine.set_mode(mode),
        Op::Event { event } => {
            if let Err(e) = engine.record_event(event) {
                warn!("rejected event: {}", e);
            }
        }
        Op::SetState { patch } => {
            if let Err(e) = engine.set_state(patch) {
                warn!("{}", e);
            }
        }
        Op::Error { message } => {
            engine.report_error(message, None);
        }
        Op::Config { patch } => {
            if let Err(e) = engine.update_config(&patch) {
                warn!("{}", e);
            }
        }
        Op::Reset => engine.reset(),
    }
    None
}

fn cmd_config(output: Option<&Path>) -> Result<()> {
    let toml = EngineConfig::default()
        .to_toml()
        .context("Failed to serialize config")?;
    write_output(output, &toml)
}

fn cmd_check(path: &Path) -> Result<()> {
    let script = Script::load(path)?;
    println!(
        "{}: {} commands, {}ms at {}ms per frame",
        path.display(),
        script.commands.len(),
        script.duration_ms,
        script.frame_interval_ms
    );
    for command in &script.commands {
        println!("  {:>6}ms  {:?}", command.at_ms, command.op);
    }
    Ok(())
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}
