//! Synthetic instrumented application: a ball bouncing around a small canvas.

use framekeeper_core::Millis;
use framekeeper_recorder::{
    serialize_state, CaptureError, EncodedImage, FnStateAccessor, RgbaFrame, StateError,
};
use framekeeper_runtime::FrameEngine;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const CANVAS_WIDTH: u32 = 320;
const CANVAS_HEIGHT: u32 = 240;
const BALL_SIZE: u32 = 12;

const BACKGROUND: [u8; 4] = [24, 26, 32, 255];
const BALL: [u8; 4] = [240, 180, 60, 255];

/// Application state exposed through the state accessor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    /// Pixels per second
    pub vx: f32,
    pub vy: f32,
    /// Velocity multiplier
    pub speed: f32,
    pub bounces: u32,
    #[serde(skip)]
    last_timestamp: Option<Millis>,
}

/// Fields a controller may inject.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BallPatch {
    x: Option<f32>,
    y: Option<f32>,
    vx: Option<f32>,
    vy: Option<f32>,
    speed: Option<f32>,
}

impl Default for Ball {
    fn default() -> Self {
        Self {
            x: 40.0,
            y: 60.0,
            vx: 140.0,
            vy: 95.0,
            speed: 1.0,
            bounces: 0,
            last_timestamp: None,
        }
    }
}

impl Ball {
    /// Advance the simulation to `timestamp`.
    fn tick(&mut self, timestamp: Millis) {
        let dt = match self.last_timestamp {
            Some(previous) => ((timestamp - previous).max(0.0) / 1000.0) as f32,
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp);

        self.x += self.vx * self.speed * dt;
        self.y += self.vy * self.speed * dt;

        let max_x = (CANVAS_WIDTH - BALL_SIZE) as f32;
        let max_y = (CANVAS_HEIGHT - BALL_SIZE) as f32;
        if self.x < 0.0 || self.x > max_x {
            self.vx = -self.vx;
            self.x = self.x.clamp(0.0, max_x);
            self.bounces += 1;
        }
        if self.y < 0.0 || self.y > max_y {
            self.vy = -self.vy;
            self.y = self.y.clamp(0.0, max_y);
            self.bounces += 1;
        }
    }

    fn apply(&mut self, patch: Value) -> Result<(), StateError> {
        let patch: BallPatch =
            serde_json::from_value(patch).map_err(|e| StateError::Access(e.to_string()))?;
        if let Some(v) = patch.x {
            self.x = v;
        }
        if let Some(v) = patch.y {
            self.y = v;
        }
        if let Some(v) = patch.vx {
            self.vx = v;
        }
        if let Some(v) = patch.vy {
            self.vy = v;
        }
        if let Some(v) = patch.speed {
            self.speed = v;
        }
        Ok(())
    }

    fn render(&self) -> RgbaFrame {
        let mut frame = RgbaFrame::solid(CANVAS_WIDTH, CANVAS_HEIGHT, BACKGROUND);
        let left = self.x.max(0.0) as u32;
        let top = self.y.max(0.0) as u32;
        for y in top..(top + BALL_SIZE).min(CANVAS_HEIGHT) {
            for x in left..(left + BALL_SIZE).min(CANVAS_WIDTH) {
                let idx = ((y * CANVAS_WIDTH + x) * 4) as usize;
                frame.data[idx..idx + 4].copy_from_slice(&BALL);
            }
        }
        frame
    }
}

/// Hook the demo into `engine` and start its animation loop.
pub fn attach(engine: &FrameEngine) -> Arc<Mutex<Ball>> {
    let ball = Arc::new(Mutex::new(Ball::default()));

    let read = ball.clone();
    let write = ball.clone();
    engine.register_state_accessor(FnStateAccessor::new(
        move || serialize_state(&*read.lock()),
        move |patch: Value| write.lock().apply(patch),
    ));

    let surface = ball.clone();
    engine.register_surface(
        move |max_width: u32, max_height: u32| -> Result<EncodedImage, CaptureError> {
            let frame = surface.lock().render().downscale(max_width, max_height);
            encode(frame)
        },
    );

    animate(engine.clone(), ball.clone());
    ball
}

#[cfg(feature = "png")]
fn encode(frame: RgbaFrame) -> Result<EncodedImage, CaptureError> {
    frame.encode_png()
}

#[cfg(not(feature = "png"))]
fn encode(frame: RgbaFrame) -> Result<EncodedImage, CaptureError> {
    Ok(frame.into_encoded())
}

fn animate(engine: FrameEngine, ball: Arc<Mutex<Ball>>) {
    let next = engine.clone();
    engine.schedule(move |timestamp| {
        ball.lock().tick(timestamp);
        animate(next, ball);
    });
}
