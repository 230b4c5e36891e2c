//! Visual snapshot ring buffer.
//!
//! Every Nth completed frame the engine asks the registered
//! [`SurfaceCapture`] for a downscaled image. Capture is best-effort: a
//! failing or panicking surface simply produces no snapshot for that frame.

use framekeeper_core::{panic_message, FrameNumber};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Failures reported by a visual surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The surface cannot be read right now (e.g. no frame presented yet)
    #[error("Surface unavailable: {0}")]
    Unavailable(String),

    /// Reading or encoding the pixels failed
    #[error("Capture failed: {0}")]
    Failed(String),

    /// The surface produced no pixels
    #[error("Captured image is empty")]
    Empty,
}

/// Encoding of the bytes in an [`EncodedImage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// Uncompressed 8-bit RGBA, row-major
    Rgba8,
    Png,
}

/// Opaque captured image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// A capture tagged with the frame it was sampled after.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualSnapshot {
    pub frame_number: FrameNumber,
    pub image: EncodedImage,
}

/// Collaborator that reads the application's visual surface.
pub trait SurfaceCapture: Send {
    /// Capture the current surface, downscaled to fit `max_width` x `max_height`.
    fn capture(&mut self, max_width: u32, max_height: u32) -> Result<EncodedImage, CaptureError>;
}

impl<F> SurfaceCapture for F
where
    F: FnMut(u32, u32) -> Result<EncodedImage, CaptureError> + Send,
{
    fn capture(&mut self, max_width: u32, max_height: u32) -> Result<EncodedImage, CaptureError> {
        self(max_width, max_height)
    }
}

/// Ring buffer of visual snapshots, sampled every `stride` frames.
#[derive(Debug, Clone)]
pub struct SnapshotBuffer {
    snapshots: VecDeque<VisualSnapshot>,
    capacity: usize,
    stride: u64,
    /// Captures that failed and were skipped.
    failures: u64,
}

impl SnapshotBuffer {
    pub fn new(capacity: usize, stride: u64) -> Self {
        Self {
            snapshots: VecDeque::new(),
            capacity: capacity.max(1),
            stride: stride.max(1),
            failures: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.evict();
    }

    pub fn set_stride(&mut self, stride: u64) {
        self.stride = stride.max(1);
    }

    /// Whether `frame` falls on the sampling stride.
    pub fn should_sample(&self, frame: FrameNumber) -> bool {
        frame % self.stride == 0
    }

    /// Capture from `surface` if `frame` is on the stride.
    ///
    /// Returns whether a snapshot was stored.
    pub fn sample(
        &mut self,
        frame: FrameNumber,
        surface: &mut dyn SurfaceCapture,
        max_width: u32,
        max_height: u32,
    ) -> bool {
        if !self.should_sample(frame) {
            return false;
        }
        let result = Self::capture(surface, max_width, max_height);
        self.accept(frame, result)
    }

    /// Run one capture, turning a panic or an empty image into an error.
    pub fn capture(
        surface: &mut dyn SurfaceCapture,
        max_width: u32,
        max_height: u32,
    ) -> Result<EncodedImage, CaptureError> {
        match panic::catch_unwind(AssertUnwindSafe(|| surface.capture(max_width, max_height))) {
            Ok(Ok(image)) if image.bytes.is_empty() => Err(CaptureError::Empty),
            Ok(result) => result,
            Err(payload) => Err(CaptureError::Failed(panic_message(payload.as_ref()))),
        }
    }

    /// Store a capture result for `frame`. Errors are counted and dropped.
    pub fn accept(&mut self, frame: FrameNumber, result: Result<EncodedImage, CaptureError>) -> bool {
        match result {
            Ok(image) => {
                self.push(VisualSnapshot {
                    frame_number: frame,
                    image,
                });
                true
            }
            Err(e) => {
                self.failures += 1;
                tracing::trace!("skipping visual snapshot for frame {}: {}", frame, e);
                false
            }
        }
    }

    pub fn push(&mut self, snapshot: VisualSnapshot) {
        self.snapshots.push_back(snapshot);
        self.evict();
    }

    fn evict(&mut self) {
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    pub fn get(&self, frame: FrameNumber) -> Option<&VisualSnapshot> {
        self.snapshots.iter().find(|s| s.frame_number == frame)
    }

    pub fn latest(&self) -> Option<&VisualSnapshot> {
        self.snapshots.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VisualSnapshot> {
        self.snapshots.iter()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: u8) -> EncodedImage {
        EncodedImage {
            format: ImageFormat::Rgba8,
            width: 1,
            height: 1,
            bytes: vec![tag, tag, tag, 255],
        }
    }

    #[test]
    fn test_samples_on_stride_only() {
        let mut buffer = SnapshotBuffer::new(8, 3);
        let mut surface = |_: u32, _: u32| -> Result<EncodedImage, CaptureError> { Ok(image(1)) };

        let stored: Vec<_> = (1..=7)
            .filter(|&f| buffer.sample(f, &mut surface, 10, 10))
            .collect();
        assert_eq!(stored, vec![3, 6]);
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut buffer = SnapshotBuffer::new(2, 1);
        for frame in 1..=4 {
            buffer.push(VisualSnapshot {
                frame_number: frame,
                image: image(frame as u8),
            });
        }
        let frames: Vec<_> = buffer.iter().map(|s| s.frame_number).collect();
        assert_eq!(frames, vec![3, 4]);
        assert!(buffer.get(1).is_none());
        assert_eq!(buffer.latest().map(|s| s.frame_number), Some(4));
    }

    #[test]
    fn test_failures_are_swallowed() {
        let mut buffer = SnapshotBuffer::new(4, 1);

        let mut failing = |_: u32, _: u32| -> Result<EncodedImage, CaptureError> {
            Err(CaptureError::Unavailable("tainted".into()))
        };
        assert!(!buffer.sample(1, &mut failing, 10, 10));

        let mut panicking = |_: u32, _: u32| -> Result<EncodedImage, CaptureError> {
            panic!("gpu lost")
        };
        assert!(!buffer.sample(2, &mut panicking, 10, 10));

        let mut empty = |_: u32, _: u32| -> Result<EncodedImage, CaptureError> {
            Ok(EncodedImage {
                format: ImageFormat::Png,
                width: 0,
                height: 0,
                bytes: Vec::new(),
            })
        };
        assert!(!buffer.sample(3, &mut empty, 10, 10));

        assert!(buffer.is_empty());
        assert_eq!(buffer.failures(), 3);
    }

    #[test]
    fn test_passes_resolution_to_surface() {
        let mut buffer = SnapshotBuffer::new(4, 1);
        let mut seen = None;
        let mut surface = |w: u32, h: u32| -> Result<EncodedImage, CaptureError> {
            seen = Some((w, h));
            Ok(image(0))
        };
        assert!(buffer.sample(1, &mut surface, 160, 120));
        assert_eq!(seen, Some((160, 120)));
    }

    #[test]
    fn test_capture_reports_panic_as_failure() {
        let mut panicking = |_: u32, _: u32| -> Result<EncodedImage, CaptureError> {
            panic!("device removed")
        };
        assert_eq!(
            SnapshotBuffer::capture(&mut panicking, 1, 1),
            Err(CaptureError::Failed("device removed".into()))
        );
    }
}
