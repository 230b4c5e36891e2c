//! Frame control engine
//!
//! [`FrameEngine`] sits between the application and the host's next-frame
//! primitive. The application schedules callbacks through the engine; the
//! active [`ControlMode`] decides when they are released to the host. Each
//! host frame that runs released callbacks becomes one [`FrameRecord`] on the
//! tape, together with the events and errors delivered since the previous
//! frame, a state snapshot and, every Nth frame, a visual snapshot.
//!
//! # Locking
//!
//! The engine keeps two locks, one for control and recording state and one
//! for the application collaborators. They are never held together, and
//! neither is held while the host is called, while frame callbacks run or
//! while a step wait is resolved. Collaborators (state accessor, surface,
//! memory probe, overlay) must not call back into the engine.

use crate::fault::{self, CollaboratorGuard, FrameGuard};
use crate::host::{FrameHost, OverlayHook};
use crate::scheduler::{CallbackHandle, CallbackQueue};
use crate::step::{PendingStep, StepOutcome, StepStatus, StepWaiter};
use crate::summary::{fps_from_average, EngineSummary};
use framekeeper_core::{
    panic_message, Clock, ConfigPatch, ControlEvent, ControlMachine, ControlMode, EngineConfig,
    Error, ErrorLocation, ErrorRecord, EventData, EventError, EventRecord, FrameNumber,
    FrameRecord, InstrumentationMode, MemoryMetrics, Millis, Result, Transition,
};
use framekeeper_recorder::{
    CaptureError, EncodedImage, EventCorrelator, FrameTape, MemoryProbe, SnapshotBuffer,
    StateAccessor, StateBridge, StateError, SurfaceCapture, VisualSnapshot,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;

/// Cheap, cloneable handle to a frame control engine.
#[derive(Clone)]
pub struct FrameEngine {
    inner: Arc<Inner>,
}

pub(crate) type WeakEngine = Weak<Inner>;

pub(crate) struct Inner {
    state: Mutex<EngineState>,
    collaborators: Mutex<Collaborators>,
    host: Arc<dyn FrameHost>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct Collaborators {
    state: StateBridge,
    surface: Option<Box<dyn SurfaceCapture>>,
    memory: Option<Box<dyn MemoryProbe>>,
    overlay: Option<Box<dyn OverlayHook>>,
}

struct EngineState {
    config: EngineConfig,
    control: ControlMachine,
    instrumentation: InstrumentationMode,
    queue: CallbackQueue,
    /// A host frame has been requested and has not run yet.
    host_request_outstanding: bool,
    /// Token of the armed slow motion timer; stale timers are ignored.
    release_timer: Option<u64>,
    next_timer_token: u64,
    last_release_at: Option<Millis>,
    /// Frames completed since construction or reset.
    completed: FrameNumber,
    /// Bumped by reset so in-flight frames are discarded.
    epoch: u64,
    last_frame_timestamp: Option<Millis>,
    executing: bool,
    tape: FrameTape,
    correlator: EventCorrelator,
    snapshots: SnapshotBuffer,
    step: Option<PendingStep>,
    next_step_ticket: u64,
}

/// Host calls and step resolutions collected under the state lock and
/// performed after it is released.
#[derive(Default)]
struct Effects {
    request_frame: bool,
    timer: Option<(u64, Millis)>,
    resolutions: Vec<StepResolution>,
    overlay: Option<bool>,
}

enum StepResolution {
    /// Resolve with the state captured for the final frame.
    Completed {
        step: PendingStep,
        frame: FrameNumber,
        state: Option<Value>,
    },
    /// Resolve with a fresh state snapshot.
    Interrupted {
        step: PendingStep,
        frame: FrameNumber,
        status: StepStatus,
    },
}

/// Work for the collaborators lock at the end of a frame.
struct CapturePlan {
    max_width: u32,
    max_height: u32,
}

impl EngineState {
    fn new(config: EngineConfig) -> Self {
        Self {
            control: ControlMachine::new(),
            instrumentation: InstrumentationMode::default(),
            queue: CallbackQueue::new(),
            host_request_outstanding: false,
            release_timer: None,
            next_timer_token: 0,
            last_release_at: None,
            completed: 0,
            epoch: 0,
            last_frame_timestamp: None,
            executing: false,
            tape: FrameTape::new(config.tape_capacity),
            correlator: EventCorrelator::new(config.event_log_capacity),
            snapshots: SnapshotBuffer::new(config.snapshot_capacity, config.snapshot_stride),
            step: None,
            next_step_ticket: 0,
            config,
        }
    }

    /// The frame events and errors are attributed to right now.
    fn open_frame(&self) -> FrameNumber {
        self.completed + 1
    }

    /// Decide what to do with the pending queue under the current mode.
    fn plan_release(&mut self, now: Millis, effects: &mut Effects) {
        if !self.queue.has_pending() {
            return;
        }

        match self.control.mode() {
            ControlMode::Paused => {}
            ControlMode::Running => self.release(now, effects),
            ControlMode::Stepping { remaining } => {
                // Joining an outstanding request adds no frame. A new request
                // is only made while fewer frames are in flight than remain.
                let in_flight = u32::from(self.executing) + u32::from(self.host_request_outstanding);
                if self.host_request_outstanding || in_flight < remaining {
                    self.release(now, effects);
                }
            }
            mode @ ControlMode::SlowMotion { .. } => {
                if self.host_request_outstanding {
                    self.release(now, effects);
                    return;
                }
                if self.release_timer.is_some() {
                    return;
                }
                let since_last = self.last_release_at.map(|at| now - at);
                match mode.release_delay(since_last) {
                    Some(delay) if delay <= 0.0 => self.release(now, effects),
                    Some(delay) => {
                        self.next_timer_token += 1;
                        let token = self.next_timer_token;
                        self.release_timer = Some(token);
                        effects.timer = Some((token, delay));
                        tracing::trace!("slow motion release delayed by {:.1}ms", delay);
                    }
                    None => {}
                }
            }
        }
    }

    fn release(&mut self, now: Millis, effects: &mut Effects) {
        let count = self.queue.release_all();
        tracing::trace!("released {} callbacks in {}", count, self.control.mode().label());
        if !self.host_request_outstanding {
            self.host_request_outstanding = true;
            self.last_release_at = Some(now);
            effects.request_frame = true;
        }
    }

    /// Apply a controller event, then re-plan the queue.
    fn apply_control(&mut self, event: ControlEvent, now: Millis, effects: &mut Effects) -> Transition {
        let transition = self.control.send(event);
        if transition.changed() {
            self.release_timer = None;
        }
        if matches!(event, ControlEvent::Step(_)) || !transition.to.is_stepping() {
            self.supersede_step(effects);
        }
        self.plan_release(now, effects);
        transition
    }

    fn supersede_step(&mut self, effects: &mut Effects) {
        if let Some(step) = self.step.take() {
            effects.resolutions.push(StepResolution::Interrupted {
                step,
                frame: self.completed,
                status: StepStatus::Superseded,
            });
        }
    }
}

impl FrameEngine {
    /// Create an engine that releases frames through `host` and timestamps
    /// with `clock`.
    pub fn new(host: Arc<dyn FrameHost>, clock: Arc<dyn Clock>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "frame engine created (tape {}, snapshots {} every {} frames)",
            config.tape_capacity,
            config.snapshot_capacity,
            config.snapshot_stride
        );
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState::new(config)),
                collaborators: Mutex::new(Collaborators::default()),
                host,
                clock,
            }),
        })
    }

    pub(crate) fn downgrade(&self) -> WeakEngine {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &WeakEngine) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn now(&self) -> Millis {
        self.inner.clock.now_ms()
    }

    fn apply(&self, effects: Effects) {
        if let Some((token, delay)) = effects.timer {
            let weak = self.downgrade();
            self.inner.host.set_timer(
                delay,
                Box::new(move || {
                    if let Some(engine) = FrameEngine::upgrade(&weak) {
                        engine.on_release_timer(token);
                    }
                }),
            );
        }

        if effects.request_frame {
            let weak = self.downgrade();
            let handle = self.inner.host.request_frame(Box::new(move |timestamp| {
                if let Some(engine) = FrameEngine::upgrade(&weak) {
                    engine.run_frame(timestamp);
                }
            }));
            tracing::trace!("requested host frame {:?}", handle);
        }

        for resolution in effects.resolutions {
            match resolution {
                StepResolution::Completed { step, frame, state } => step.resolve(StepOutcome {
                    frame_number: frame,
                    state,
                    status: StepStatus::Completed,
                }),
                StepResolution::Interrupted {
                    step,
                    frame,
                    status,
                } => {
                    tracing::debug!("step wait {} resolved as {:?}", step.ticket, status);
                    step.resolve(StepOutcome {
                        frame_number: frame,
                        state: self.get_state(),
                        status,
                    });
                }
            }
        }

        if let Some(active) = effects.overlay {
            let mut collaborators = self.inner.collaborators.lock();
            if let Some(overlay) = collaborators.overlay.as_mut() {
                if active {
                    notify_overlay(overlay.as_mut(), |o| o.on_activate());
                } else {
                    notify_overlay(overlay.as_mut(), |o| o.on_deactivate());
                }
            }
        }
    }

    fn transition(&self, event: ControlEvent) {
        let now = self.now();
        let effects = {
            let mut state = self.inner.state.lock();
            let mut effects = Effects::default();
            state.apply_control(event, now, &mut effects);
            effects
        };
        self.apply(effects);
    }

    fn on_release_timer(&self, token: u64) {
        let now = self.now();
        let effects = {
            let mut state = self.inner.state.lock();
            if state.release_timer != Some(token) {
                return;
            }
            state.release_timer = None;
            let mut effects = Effects::default();
            state.plan_release(now, &mut effects);
            effects
        };
        self.apply(effects);
    }

    // ---------------------------------------------------------------
    // Frame scheduler
    // ---------------------------------------------------------------

    /// Run `callback` on a future frame, as the active mode allows.
    ///
    /// Never fails. The callback receives the host frame timestamp.
    pub fn schedule<F>(&self, callback: F) -> CallbackHandle
    where
        F: FnOnce(Millis) + Send + 'static,
    {
        let now = self.now();
        let (handle, effects) = {
            let mut state = self.inner.state.lock();
            let handle = state.queue.enqueue(Box::new(callback));
            let mut effects = Effects::default();
            state.plan_release(now, &mut effects);
            (handle, effects)
        };
        self.apply(effects);
        handle
    }

    /// Withdraw a callback that has not run yet.
    pub fn cancel(&self, handle: CallbackHandle) -> bool {
        self.inner.state.lock().queue.cancel(handle)
    }

    /// Execute the released batch as one frame. Called from the host.
    fn run_frame(&self, timestamp: Millis) {
        let (batch, frame, epoch, capture) = {
            let mut state = self.inner.state.lock();
            state.host_request_outstanding = false;
            let batch = state.queue.take_released();
            if batch.is_empty() {
                let mut effects = Effects::default();
                state.plan_release(timestamp, &mut effects);
                drop(state);
                self.apply(effects);
                return;
            }
            state.executing = true;
            let frame = state.open_frame();
            let capture = state.snapshots.should_sample(frame).then(|| CapturePlan {
                max_width: state.config.snapshot_max_width,
                max_height: state.config.snapshot_max_height,
            });
            (batch, frame, state.epoch, capture)
        };

        let mut faults = Vec::new();
        {
            let _guard = FrameGuard::enter();
            for pending in batch {
                let id = pending.id;
                let callback = pending.callback;
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || callback(timestamp))) {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!("frame callback {:?} failed in frame {}: {}", id, frame, message);
                    faults.push((message, fault::take_panic_location()));
                }
            }
        }

        let (snapshot, memory, image) = self.sample_collaborators(capture);

        let now = self.now();
        let (record, effects) = {
            let mut state = self.inner.state.lock();
            state.executing = false;
            let mut effects = Effects::default();

            if state.epoch != epoch {
                tracing::debug!("discarding frame {} interrupted by reset", frame);
                state.plan_release(now, &mut effects);
                (None, effects)
            } else {
                for (message, location) in faults {
                    state.correlator.record_error(frame, now, message, location);
                }
                state.completed = frame;

                let duration_ms = state
                    .last_frame_timestamp
                    .map_or(0.0, |previous| (timestamp - previous).max(0.0));
                state.last_frame_timestamp = Some(timestamp);

                let record = FrameRecord {
                    frame_number: frame,
                    timestamp,
                    duration_ms,
                    state: snapshot,
                    events: state.correlator.drain_pending(),
                    errors: state.correlator.errors_for(frame),
                    memory,
                };
                state.tape.push(record.clone());
                if let Some(result) = image {
                    state.snapshots.accept(frame, result);
                }
                tracing::trace!(
                    "frame {} recorded ({} events, {} errors)",
                    frame,
                    record.events.len(),
                    record.errors.len()
                );

                let transition = state.control.send(ControlEvent::FrameCompleted);
                if transition.step_exhausted() {
                    if let Some(step) = state.step.take() {
                        effects.resolutions.push(StepResolution::Completed {
                            step,
                            frame,
                            state: record.state.clone(),
                        });
                    }
                }
                state.plan_release(now, &mut effects);

                let record = state.instrumentation.is_active().then_some(record);
                (record, effects)
            }
        };

        self.apply(effects);

        if let Some(record) = record {
            let mut collaborators = self.inner.collaborators.lock();
            if let Some(overlay) = collaborators.overlay.as_mut() {
                notify_overlay(overlay.as_mut(), |o| o.on_frame(&record));
            }
        }
    }

    fn sample_collaborators(
        &self,
        capture: Option<CapturePlan>,
    ) -> (
        Option<Value>,
        Option<MemoryMetrics>,
        Option<std::result::Result<EncodedImage, CaptureError>>,
    ) {
        let mut collaborators = self.inner.collaborators.lock();
        let _guard = CollaboratorGuard::enter();
        let snapshot = collaborators.state.snapshot();
        let memory = collaborators.memory.as_ref().and_then(|probe| {
            panic::catch_unwind(AssertUnwindSafe(|| probe.sample()))
                .ok()
                .flatten()
        });
        let image = match (capture, collaborators.surface.as_mut()) {
            (Some(plan), Some(surface)) => Some(SnapshotBuffer::capture(
                surface.as_mut(),
                plan.max_width,
                plan.max_height,
            )),
            _ => None,
        };
        (snapshot, memory, image)
    }

    // ---------------------------------------------------------------
    // Control surface
    // ---------------------------------------------------------------

    /// Hold every queued callback. Callbacks already forwarded to the host
    /// still run. An outstanding step wait is superseded.
    pub fn pause(&self) {
        self.transition(ControlEvent::Pause);
    }

    /// Return to normal speed and release anything queued.
    pub fn resume(&self) {
        self.transition(ControlEvent::Resume);
    }

    /// Run exactly `frames` frames, then pause.
    ///
    /// The returned waiter resolves when the last frame completes, or with
    /// `TimedOut` after the configured step timeout. A later `step` or mode
    /// change resolves it with `Superseded`. `step(0)` resolves at once.
    pub fn step(&self, frames: u32) -> StepWaiter {
        if frames == 0 {
            let outcome = self.current_outcome(StepStatus::Completed);
            return StepWaiter::ready(self.clone(), outcome);
        }

        let (tx, rx) = oneshot::channel();
        let now = self.now();
        let (ticket, timeout, effects) = {
            let mut state = self.inner.state.lock();
            let mut effects = Effects::default();
            state.apply_control(ControlEvent::Step(frames), now, &mut effects);
            state.next_step_ticket += 1;
            let ticket = state.next_step_ticket;
            state.step = Some(PendingStep { ticket, tx });
            (
                ticket,
                Duration::from_millis(state.config.step_timeout_ms),
                effects,
            )
        };
        self.apply(effects);
        StepWaiter::pending(self.clone(), ticket, rx, timeout)
    }

    /// Like [`step`](Self::step), without a wait.
    pub fn step_sync(&self, frames: u32) {
        if frames > 0 {
            self.transition(ControlEvent::Step(frames));
        }
    }

    /// Space releases at least `1000 / fps` milliseconds apart.
    pub fn set_slow_motion(&self, fps: f64) -> Result<()> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(Error::InvalidArgument(format!(
                "slow motion rate must be a positive number of frames per second, got {fps}"
            )));
        }
        self.transition(ControlEvent::SlowMotion(fps));
        Ok(())
    }

    /// Slow motion at the configured default rate.
    pub fn set_slow_motion_default(&self) {
        let fps = self.inner.state.lock().config.default_slow_motion_fps;
        self.transition(ControlEvent::SlowMotion(fps));
    }

    pub fn clear_slow_motion(&self) {
        self.transition(ControlEvent::ClearSlowMotion);
    }

    /// Switch instrumentation on (`Agent`) or off (`User`).
    ///
    /// `User` always restores normal running, even if instrumentation was
    /// already off. The overlay is only notified when the mode changes.
    pub fn set_mode(&self, mode: InstrumentationMode) {
        let now = self.now();
        let effects = {
            let mut state = self.inner.state.lock();
            let changed = state.instrumentation != mode;
            state.instrumentation = mode;
            let mut effects = Effects::default();
            if !mode.is_active() {
                state.apply_control(ControlEvent::Resume, now, &mut effects);
            }
            effects.overlay = changed.then_some(mode.is_active());
            effects
        };
        tracing::debug!("instrumentation mode set to {:?}", mode);
        self.apply(effects);
    }

    /// Zero the frame counter, clear every buffer and return to running.
    ///
    /// Registered collaborators, queued callbacks and the instrumentation
    /// mode are kept. A frame executing during the reset is not recorded.
    pub fn reset(&self) {
        let now = self.now();
        let effects = {
            let mut state = self.inner.state.lock();
            let mut effects = Effects::default();
            state.epoch += 1;
            state.completed = 0;
            state.last_frame_timestamp = None;
            state.last_release_at = None;
            state.tape.clear();
            state.correlator.clear();
            state.snapshots.clear();
            state.apply_control(ControlEvent::Reset, now, &mut effects);
            state.release_timer = None;
            state.control.clear_history();
            effects
        };
        tracing::debug!("frame engine reset");
        self.apply(effects);
    }

    /// Give up on step wait `ticket` if it is still outstanding.
    pub(crate) fn expire_step(&self, ticket: u64) -> Option<StepOutcome> {
        let frame = {
            let mut state = self.inner.state.lock();
            if state.step.as_ref().map(|step| step.ticket) != Some(ticket) {
                return None;
            }
            state.step = None;
            state.completed
        };
        tracing::debug!("step wait {} timed out at frame {}", ticket, frame);
        Some(StepOutcome {
            frame_number: frame,
            state: self.get_state(),
            status: StepStatus::TimedOut,
        })
    }

    pub(crate) fn current_outcome(&self, status: StepStatus) -> StepOutcome {
        StepOutcome {
            frame_number: self.frame_number(),
            state: self.get_state(),
            status,
        }
    }

    // ---------------------------------------------------------------
    // Recording
    // ---------------------------------------------------------------

    /// Validate an input event and attribute it to the open frame.
    pub fn record_event(&self, data: EventData) -> std::result::Result<EventRecord, EventError> {
        let now = self.now();
        let mut state = self.inner.state.lock();
        let frame = state.open_frame();
        state.correlator.record_event(frame, now, data)
    }

    /// Record an application error against the open frame.
    pub fn report_error(
        &self,
        message: impl Into<String>,
        location: Option<ErrorLocation>,
    ) -> ErrorRecord {
        let now = self.now();
        let mut state = self.inner.state.lock();
        let frame = state.open_frame();
        state.correlator.record_error(frame, now, message, location)
    }

    /// [`report_error`](Self::report_error) that gives up if the engine is
    /// busy. Used from the panic hook.
    pub(crate) fn try_report_error(&self, message: String, location: Option<ErrorLocation>) -> bool {
        let now = self.now();
        match self.inner.state.try_lock() {
            Some(mut state) => {
                let frame = state.open_frame();
                state.correlator.record_error(frame, now, message, location);
                true
            }
            None => false,
        }
    }

    /// Tape records with `from <= frame_number <= to`.
    pub fn frame_tape(&self, from: FrameNumber, to: FrameNumber) -> Vec<FrameRecord> {
        self.inner.state.lock().tape.range(from, to)
    }

    /// The most recent `n` tape records, oldest first.
    pub fn last_frames(&self, n: usize) -> Vec<FrameRecord> {
        self.inner.state.lock().tape.last(n)
    }

    /// The most recent `n` entries of the rolling event log.
    pub fn event_log(&self, n: usize) -> Vec<EventRecord> {
        self.inner.state.lock().correlator.recent_events(n)
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.inner.state.lock().correlator.errors().to_vec()
    }

    pub fn clear_errors(&self) {
        self.inner.state.lock().correlator.clear_errors();
    }

    pub fn snapshots(&self) -> Vec<VisualSnapshot> {
        self.inner.state.lock().snapshots.iter().cloned().collect()
    }

    pub fn snapshot(&self, frame: FrameNumber) -> Option<VisualSnapshot> {
        self.inner.state.lock().snapshots.get(frame).cloned()
    }

    pub fn latest_snapshot(&self) -> Option<VisualSnapshot> {
        self.inner.state.lock().snapshots.latest().cloned()
    }

    // ---------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------

    /// Frames completed since construction or the last reset.
    pub fn frame_number(&self) -> FrameNumber {
        self.inner.state.lock().completed
    }

    pub fn mode(&self) -> ControlMode {
        self.inner.state.lock().control.mode()
    }

    pub fn instrumentation(&self) -> InstrumentationMode {
        self.inner.state.lock().instrumentation
    }

    /// Recent control mode changes, oldest first.
    pub fn control_history(&self) -> Vec<Transition> {
        self.inner.state.lock().control.history().copied().collect()
    }

    pub fn summary(&self) -> EngineSummary {
        let state = self.inner.state.lock();
        let average_frame_ms = state.tape.average_duration(state.config.summary_window);
        EngineSummary {
            mode: state.control.mode(),
            instrumentation: state.instrumentation,
            frame_number: state.completed,
            pending_callbacks: state.queue.pending_len(),
            released_callbacks: state.queue.released_len(),
            tape_len: state.tape.len(),
            tape_capacity: state.tape.capacity(),
            frames_evicted: state.tape.evicted(),
            event_log_len: state.correlator.log_len(),
            error_count: state.correlator.errors().len(),
            snapshot_count: state.snapshots.len(),
            snapshot_failures: state.snapshots.failures(),
            average_frame_ms,
            fps: fps_from_average(average_frame_ms),
            recent_errors: state.correlator.recent_errors(state.config.recent_error_count),
            step_pending: state.step.is_some(),
        }
    }

    // ---------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------

    pub fn config(&self) -> EngineConfig {
        self.inner.state.lock().config.clone()
    }

    /// Merge `patch` into the configuration. Buffers shrink immediately,
    /// evicting their oldest entries.
    pub fn update_config(&self, patch: &ConfigPatch) -> Result<()> {
        let mut state = self.inner.state.lock();
        let merged = state.config.merged(patch);
        merged.validate()?;

        state.tape.set_capacity(merged.tape_capacity);
        state.correlator.set_log_capacity(merged.event_log_capacity);
        state.snapshots.set_capacity(merged.snapshot_capacity);
        state.snapshots.set_stride(merged.snapshot_stride);
        state.config = merged;
        tracing::debug!("engine configuration updated");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Collaborators
    // ---------------------------------------------------------------

    /// Deep copy of the application state, if an accessor is registered.
    pub fn get_state(&self) -> Option<Value> {
        let collaborators = self.inner.collaborators.lock();
        let _guard = CollaboratorGuard::enter();
        collaborators.state.snapshot()
    }

    /// Inject new state into the application.
    pub fn set_state(&self, patch: Value) -> std::result::Result<(), StateError> {
        let mut collaborators = self.inner.collaborators.lock();
        let _guard = CollaboratorGuard::enter();
        collaborators.state.apply(patch)
    }

    pub fn register_state_accessor(&self, accessor: impl StateAccessor + 'static) {
        self.inner.collaborators.lock().state.register(Box::new(accessor));
    }

    pub fn unregister_state_accessor(&self) {
        self.inner.collaborators.lock().state.unregister();
    }

    pub fn register_surface(&self, surface: impl SurfaceCapture + 'static) {
        self.inner.collaborators.lock().surface = Some(Box::new(surface));
    }

    pub fn unregister_surface(&self) {
        self.inner.collaborators.lock().surface = None;
    }

    pub fn register_memory_probe(&self, probe: impl MemoryProbe + 'static) {
        self.inner.collaborators.lock().memory = Some(Box::new(probe));
    }

    /// Register the overlay. It is activated at once if instrumentation is on.
    pub fn register_overlay(&self, overlay: impl OverlayHook + 'static) {
        let active = self.instrumentation().is_active();
        let mut overlay: Box<dyn OverlayHook> = Box::new(overlay);
        if active {
            notify_overlay(overlay.as_mut(), |o| o.on_activate());
        }
        self.inner.collaborators.lock().overlay = Some(overlay);
    }
}

/// Call into the overlay, containing any panic.
fn notify_overlay(overlay: &mut dyn OverlayHook, call: impl FnOnce(&mut dyn OverlayHook)) {
    let _guard = CollaboratorGuard::enter();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || call(overlay))) {
        tracing::warn!("overlay panicked: {}", panic_message(payload.as_ref()));
    }
}

impl std::fmt::Debug for FrameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("FrameEngine")
            .field("mode", &state.control.mode())
            .field("instrumentation", &state.instrumentation)
            .field("frame_number", &state.completed)
            .field("pending", &state.queue.pending_len())
            .finish()
    }
}
