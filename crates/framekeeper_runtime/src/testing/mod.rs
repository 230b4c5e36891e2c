//! Testing utilities for applications driven by a [`FrameEngine`](crate::FrameEngine).

mod headless;

pub use headless::ManualHost;
