//! End-to-end control and recording scenarios on a headless host.

use framekeeper_core::{
    ControlMode, EngineConfig, ErrorLocation, EventData, InstrumentationMode, ManualClock,
    MemoryMetrics, Modifiers, PointerButton,
};
use framekeeper_recorder::{
    CaptureError, EncodedImage, FnMemoryProbe, FnStateAccessor, ImageFormat, RgbaFrame,
    StateError,
};
use framekeeper_runtime::testing::ManualHost;
use framekeeper_runtime::{FrameEngine, OverlayHook, StepStatus};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

struct Harness {
    engine: FrameEngine,
    host: Arc<ManualHost>,
    clock: ManualClock,
}

fn harness(config: EngineConfig) -> Harness {
    let clock = ManualClock::new();
    let host = Arc::new(ManualHost::new(clock.clone()));
    let engine = FrameEngine::new(host.clone(), Arc::new(clock.clone()), config).unwrap();
    Harness {
        engine,
        host,
        clock,
    }
}

/// Registers a state accessor over a shared JSON object.
fn shared_state(engine: &FrameEngine, initial: Value) -> Arc<Mutex<Value>> {
    let state = Arc::new(Mutex::new(initial));
    let read = state.clone();
    let write = state.clone();
    engine.register_state_accessor(FnStateAccessor::new(
        move || Ok(read.lock().unwrap().clone()),
        move |patch: Value| {
            let mut current = write.lock().unwrap();
            match (current.as_object_mut(), patch) {
                (Some(target), Value::Object(fields)) => {
                    target.extend(fields);
                    Ok(())
                }
                _ => Err(StateError::Access("patch must be an object".into())),
            }
        },
    ));
    state
}

/// A callback that re-schedules itself every frame, like an animation loop.
fn animate(engine: &FrameEngine, state: Arc<Mutex<Value>>) {
    let next = engine.clone();
    engine.schedule(move |_| {
        {
            let mut current = state.lock().unwrap();
            let ticks = current["ticks"].as_u64().unwrap_or(0);
            current["ticks"] = json!(ticks + 1);
        }
        animate(&next, state);
    });
}

#[test]
fn test_paused_callbacks_wait_and_keep_order() {
    let h = harness(EngineConfig::default());
    h.engine.pause();

    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in 1..=4 {
        let order = order.clone();
        h.engine.schedule(move |_| order.lock().unwrap().push(tag));
    }

    h.host.run_frames(5, 16.0);
    assert!(order.lock().unwrap().is_empty());
    assert_eq!(h.engine.frame_number(), 0);

    h.engine.resume();
    h.host.run_frames(1, 16.0);
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(h.engine.frame_number(), 1);
}

#[tokio::test]
async fn test_step_one_runs_single_batch_and_resolves_with_state() {
    let h = harness(EngineConfig::default());
    let state = shared_state(&h.engine, json!({ "score": 0 }));
    h.engine.pause();

    let runs = Arc::new(Mutex::new(0));
    for points in [1, 10, 100] {
        let state = state.clone();
        let runs = runs.clone();
        h.engine.schedule(move |_| {
            *runs.lock().unwrap() += 1;
            let mut current = state.lock().unwrap();
            let score = current["score"].as_i64().unwrap_or(0);
            current["score"] = json!(score + points);
        });
    }

    let waiter = h.engine.step(1);
    assert_eq!(h.host.pending_frames(), 1);
    h.host.run_frames(3, 16.0);

    let outcome = waiter.wait().await;
    assert_eq!(outcome.status, StepStatus::Completed);
    assert_eq!(outcome.frame_number, 1);
    assert_eq!(outcome.state, Some(json!({ "score": 111 })));

    assert_eq!(*runs.lock().unwrap(), 3);
    assert_eq!(h.engine.mode(), ControlMode::Paused);
    assert_eq!(h.engine.last_frames(10).len(), 1);
}

#[tokio::test]
async fn test_step_advances_exactly_n_frames() {
    let h = harness(EngineConfig::default());
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    h.engine.pause();
    animate(&h.engine, state.clone());

    let waiter = h.engine.step(4);
    h.host.run_frames(20, 16.0);
    let outcome = waiter.wait().await;

    assert_eq!(outcome.frame_number, 4);
    assert_eq!(outcome.state, Some(json!({ "ticks": 4 })));
    assert_eq!(state.lock().unwrap()["ticks"], 4);

    let waiter = h.engine.step(2);
    h.host.run_frames(20, 16.0);
    assert_eq!(waiter.wait().await.frame_number, 6);
}

#[tokio::test(start_paused = true)]
async fn test_step_times_out_when_host_never_presents() {
    let h = harness(EngineConfig::default());
    shared_state(&h.engine, json!({ "stuck": true }));
    h.engine.pause();
    h.engine.schedule(|_| {});

    let started = tokio::time::Instant::now();
    let outcome = h.engine.step(1).wait().await;

    assert!(outcome.timed_out());
    assert_eq!(outcome.frame_number, 0);
    assert_eq!(outcome.state, Some(json!({ "stuck": true })));
    assert!(started.elapsed() >= std::time::Duration::from_millis(5000));
    assert!(!h.engine.summary().step_pending);
}

#[tokio::test(start_paused = true)]
async fn test_step_timeout_follows_config() {
    let h = harness(EngineConfig::default().with_step_timeout_ms(250));
    h.engine.pause();
    h.engine.schedule(|_| {});

    let started = tokio::time::Instant::now();
    let outcome = h.engine.step(1).wait().await;
    assert!(outcome.timed_out());
    assert!(started.elapsed() < std::time::Duration::from_millis(5000));
}

#[tokio::test]
async fn test_new_step_supersedes_previous_wait() {
    let h = harness(EngineConfig::default());
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    h.engine.pause();
    animate(&h.engine, state);

    let first = h.engine.step(5);
    let second = h.engine.step(1);

    let outcome = first.wait().await;
    assert_eq!(outcome.status, StepStatus::Superseded);
    assert_eq!(outcome.frame_number, 0);

    h.host.run_frames(10, 16.0);
    let outcome = second.wait().await;
    assert_eq!(outcome.status, StepStatus::Completed);
    assert_eq!(outcome.frame_number, 1);
}

#[test]
fn test_tape_keeps_most_recent_records_in_order() {
    let h = harness(EngineConfig::default().with_tape_capacity(5));
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    animate(&h.engine, state);

    h.host.run_frames(12, 16.0);

    let frames: Vec<_> = h.engine.last_frames(100).iter().map(|r| r.frame_number).collect();
    assert_eq!(frames, vec![8, 9, 10, 11, 12]);
    assert_eq!(h.engine.frame_tape(9, 10).len(), 2);
    assert!(h.engine.frame_tape(1, 7).is_empty());

    let summary = h.engine.summary();
    assert_eq!(summary.tape_len, 5);
    assert_eq!(summary.frames_evicted, 7);
}

#[test]
fn test_records_carry_duration_and_detached_state() {
    let h = harness(EngineConfig::default());
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    animate(&h.engine, state);

    h.host.run_frames(3, 20.0);
    let records = h.engine.last_frames(3);

    assert_eq!(records[0].duration_ms, 0.0);
    assert_eq!(records[1].duration_ms, 20.0);
    assert_eq!(records[2].timestamp, 60.0);
    let ticks: Vec<_> = records.iter().map(|r| r.state.clone().unwrap()["ticks"].clone()).collect();
    assert_eq!(ticks, vec![json!(1), json!(2), json!(3)]);

    let summary = h.engine.summary();
    assert_eq!(summary.average_frame_ms, Some(20.0));
    assert_eq!(summary.fps, Some(50.0));
}

#[test]
fn test_events_are_attributed_to_delivery_window() {
    let h = harness(EngineConfig::default());
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    animate(&h.engine, state);

    let key = |key: &str| EventData::KeyDown {
        key: key.into(),
        modifiers: Modifiers::default(),
        repeat: false,
    };

    h.engine.record_event(key("a")).unwrap();
    h.host.run_frames(1, 16.0);

    h.engine.record_event(key("b")).unwrap();
    h.engine
        .record_event(EventData::PointerDown {
            x: 4.0,
            y: 8.0,
            button: PointerButton::Primary,
        })
        .unwrap();
    h.host.run_frames(2, 16.0);

    let records = h.engine.last_frames(3);
    let kinds: Vec<Vec<&str>> = records
        .iter()
        .map(|r| r.events.iter().map(|e| e.kind()).collect())
        .collect();
    assert_eq!(kinds, vec![vec!["key_down"], vec!["key_down", "pointer_down"], vec![]]);

    for record in &records {
        assert!(record.events.iter().all(|e| e.frame_number == record.frame_number));
    }

    assert_eq!(h.engine.event_log(10).len(), 3);
    assert_eq!(h.engine.event_log(1)[0].kind(), "pointer_down");
}

#[test]
fn test_invalid_events_are_rejected() {
    let h = harness(EngineConfig::default());
    let bad = EventData::PointerMove {
        x: f32::NAN,
        y: 1.0,
    };
    assert!(h.engine.record_event(bad).is_err());
    assert!(h.engine.event_log(10).is_empty());
}

#[test]
fn test_panicking_callback_is_recorded_and_siblings_run() {
    let h = harness(EngineConfig::default());
    let ran = Arc::new(Mutex::new(Vec::new()));

    let before = ran.clone();
    h.engine.schedule(move |_| before.lock().unwrap().push("before"));
    h.engine.schedule(|_| panic!("sprite sheet missing"));
    let after = ran.clone();
    h.engine.schedule(move |_| after.lock().unwrap().push("after"));

    h.host.run_frames(1, 16.0);

    assert_eq!(*ran.lock().unwrap(), vec!["before", "after"]);
    let record = &h.engine.last_frames(1)[0];
    assert_eq!(record.errors.len(), 1);
    assert_eq!(record.errors[0].message, "sprite sheet missing");
    assert_eq!(record.errors[0].frame_number, 1);
    assert_eq!(h.engine.errors().len(), 1);

    h.engine.clear_errors();
    assert!(h.engine.errors().is_empty());
}

#[test]
fn test_reported_errors_join_the_next_frame() {
    let h = harness(EngineConfig::default());
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    animate(&h.engine, state);
    h.host.run_frames(1, 16.0);

    let error = h
        .engine
        .report_error("texture upload failed", Some(ErrorLocation::new("render.rs", 88, 5)));
    assert_eq!(error.frame_number, 2);

    h.host.run_frames(1, 16.0);
    let record = &h.engine.last_frames(1)[0];
    assert_eq!(record.frame_number, 2);
    assert_eq!(record.errors, vec![error]);

    let summary = h.engine.summary();
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.recent_errors.len(), 1);
}

#[test]
fn test_reset_clears_history_and_keeps_collaborators() {
    let h = harness(EngineConfig::default().with_snapshots(4, 1));
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    h.engine.register_surface(|width: u32, height: u32| -> Result<EncodedImage, CaptureError> {
        Ok(RgbaFrame::solid(640, 480, [9, 9, 9, 255]).downscale(width, height).into_encoded())
    });
    animate(&h.engine, state);

    h.engine.record_event(EventData::Focus).unwrap();
    h.host.run_frames(3, 16.0);
    h.engine.report_error("boom", None);
    h.engine.set_mode(InstrumentationMode::Agent);
    h.engine.pause();

    h.engine.reset();

    let summary = h.engine.summary();
    assert_eq!(summary.frame_number, 0);
    assert_eq!(summary.tape_len, 0);
    assert_eq!(summary.event_log_len, 0);
    assert_eq!(summary.error_count, 0);
    assert_eq!(summary.snapshot_count, 0);
    assert_eq!(summary.mode, ControlMode::Running);
    assert_eq!(summary.instrumentation, InstrumentationMode::Agent);

    // The animation loop survives the reset and collaborators still report.
    h.host.run_frames(2, 16.0);
    let records = h.engine.last_frames(10);
    assert_eq!(records.first().map(|r| r.frame_number), Some(1));
    assert!(records[0].state.is_some());
    assert_eq!(h.engine.snapshots().len(), 2);
}

#[test]
fn test_reset_during_frame_discards_it() {
    let h = harness(EngineConfig::default());
    let engine = h.engine.clone();
    h.engine.schedule(move |_| engine.reset());
    h.host.run_frames(1, 16.0);

    assert_eq!(h.engine.frame_number(), 0);
    assert!(h.engine.last_frames(10).is_empty());
}

#[test]
fn test_slow_motion_spaces_releases() {
    let h = harness(EngineConfig::default());
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    h.engine.set_slow_motion(2.0).unwrap();
    animate(&h.engine, state);

    h.host.run_frames(200, 16.0);

    let log = h.host.request_log();
    assert!(log.len() >= 3, "expected several releases, got {:?}", log);
    for pair in log.windows(2) {
        assert!(pair[1] - pair[0] >= 500.0 - 1e-6, "gap too small: {:?}", pair);
    }
    // 200 frames at 16ms is 3.2s of host time.
    assert!(h.engine.frame_number() <= 7);
}

#[test]
fn test_clear_slow_motion_releases_at_full_rate() {
    let h = harness(EngineConfig::default());
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    h.engine.set_slow_motion(1.0).unwrap();
    animate(&h.engine, state);
    h.host.run_frames(2, 16.0);
    assert_eq!(h.host.pending_timers(), 1);

    h.engine.clear_slow_motion();
    let before = h.engine.frame_number();
    h.host.run_frames(10, 16.0);
    assert_eq!(h.engine.frame_number(), before + 10);
}

#[test]
fn test_snapshots_follow_stride_and_failures_are_swallowed() {
    let h = harness(EngineConfig::default().with_snapshots(3, 2));
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    let calls = Arc::new(Mutex::new(0u32));
    let counted = calls.clone();
    h.engine.register_surface(move |width: u32, height: u32| -> Result<EncodedImage, CaptureError> {
        let mut calls = counted.lock().unwrap();
        *calls += 1;
        if *calls == 2 {
            return Err(CaptureError::Unavailable("surface lost".into()));
        }
        Ok(EncodedImage {
            format: ImageFormat::Rgba8,
            width,
            height,
            bytes: vec![0; (width * height * 4) as usize],
        })
    });
    animate(&h.engine, state);

    h.host.run_frames(12, 16.0);

    assert_eq!(*calls.lock().unwrap(), 6);
    let frames: Vec<_> = h.engine.snapshots().iter().map(|s| s.frame_number).collect();
    assert_eq!(frames, vec![8, 10, 12]);
    assert_eq!(h.engine.latest_snapshot().map(|s| s.image.width), Some(160));
    assert!(h.engine.snapshot(4).is_none());
    assert_eq!(h.engine.summary().snapshot_failures, 1);
    assert_eq!(h.engine.frame_number(), 12);
}

#[test]
fn test_panicking_state_getter_degrades_record() {
    let h = harness(EngineConfig::default());
    h.engine.register_state_accessor(FnStateAccessor::new(
        || -> Result<Value, StateError> { panic!("state lock poisoned") },
        |_| Ok(()),
    ));
    h.engine.schedule(|_| {});
    h.host.run_frames(1, 16.0);

    let record = &h.engine.last_frames(1)[0];
    assert_eq!(record.state, Some(json!({ "error": "state lock poisoned" })));
}

#[test]
fn test_set_state_injects_into_application() {
    let h = harness(EngineConfig::default());
    let state = shared_state(&h.engine, json!({ "level": 1, "lives": 3 }));

    h.engine.set_state(json!({ "level": 7 })).unwrap();
    assert_eq!(*state.lock().unwrap(), json!({ "level": 7, "lives": 3 }));
    assert_eq!(h.engine.get_state(), Some(json!({ "level": 7, "lives": 3 })));
    assert!(h.engine.set_state(json!(42)).is_err());

    h.engine.unregister_state_accessor();
    assert_eq!(h.engine.get_state(), None);
    assert_eq!(h.engine.set_state(json!({})), Err(StateError::NoAccessor));
}

#[test]
fn test_memory_probe_is_sampled_per_frame() {
    let h = harness(EngineConfig::default());
    h.engine.register_memory_probe(FnMemoryProbe(|| {
        Some(MemoryMetrics {
            used: 1024,
            total: 4096,
        })
    }));
    h.engine.schedule(|_| {});
    h.host.run_frames(1, 16.0);

    let record = &h.engine.last_frames(1)[0];
    assert_eq!(
        record.memory,
        Some(MemoryMetrics {
            used: 1024,
            total: 4096
        })
    );
}

#[test]
fn test_overlay_sees_frames_only_in_agent_mode() {
    struct Collect(Arc<Mutex<Vec<u64>>>);
    impl OverlayHook for Collect {
        fn on_frame(&mut self, record: &framekeeper_core::FrameRecord) {
            self.0.lock().unwrap().push(record.frame_number);
        }
    }

    let h = harness(EngineConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    h.engine.register_overlay(Collect(seen.clone()));
    let state = shared_state(&h.engine, json!({ "ticks": 0 }));
    animate(&h.engine, state);

    h.host.run_frames(2, 16.0);
    h.engine.set_mode(InstrumentationMode::Agent);
    h.host.run_frames(2, 16.0);
    h.engine.set_mode(InstrumentationMode::User);
    h.host.run_frames(2, 16.0);

    assert_eq!(*seen.lock().unwrap(), vec![3, 4]);
}

#[test]
fn test_user_mode_restores_running() {
    let h = harness(EngineConfig::default());
    h.engine.set_mode(InstrumentationMode::Agent);
    h.engine.set_slow_motion(5.0).unwrap();

    let ran = Arc::new(Mutex::new(false));
    let flag = ran.clone();
    h.engine.pause();
    h.engine.schedule(move |_| *flag.lock().unwrap() = true);

    h.engine.set_mode(InstrumentationMode::User);
    assert_eq!(h.engine.mode(), ControlMode::Running);
    h.host.run_frames(1, 16.0);
    assert!(*ran.lock().unwrap());
    assert_eq!(h.clock.as_micros(), 16_000);
}
