//! Raw framebuffer helpers for surface implementations.
//!
//! A [`SurfaceCapture`](crate::SurfaceCapture) usually reads back a full
//! resolution RGBA framebuffer. [`RgbaFrame`] downscales it to the
//! snapshot resolution and wraps it as an [`EncodedImage`].

use crate::snapshot::{CaptureError, EncodedImage, ImageFormat};

/// Raw captured framebuffer data (RGBA8, row-major).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbaFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RgbaFrame {
    /// Wrap pixel data, checking that it matches the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, CaptureError> {
        let frame = Self {
            data,
            width,
            height,
        };
        if frame.pixel_count() == 0 {
            return Err(CaptureError::Empty);
        }
        if frame.data.len() != frame.expected_size() {
            return Err(CaptureError::Failed(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                frame.expected_size(),
                width,
                height,
                frame.data.len()
            )));
        }
        Ok(frame)
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            data,
            width,
            height,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn expected_size(&self) -> usize {
        self.pixel_count() * 4
    }

    /// Get a pixel at (x, y) as RGBA.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Nearest-neighbour downscale that fits within `max_width` x `max_height`
    /// while keeping the aspect ratio. Frames that already fit are returned as is.
    pub fn downscale(&self, max_width: u32, max_height: u32) -> RgbaFrame {
        let max_width = max_width.max(1);
        let max_height = max_height.max(1);
        if self.width <= max_width && self.height <= max_height {
            return self.clone();
        }

        let scale = f64::min(
            max_width as f64 / self.width as f64,
            max_height as f64 / self.height as f64,
        );
        let width = ((self.width as f64 * scale).floor() as u32).clamp(1, max_width);
        let height = ((self.height as f64 * scale).floor() as u32).clamp(1, max_height);

        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as u32;
                let px = self.get_pixel(src_x, src_y).unwrap_or([0, 0, 0, 0]);
                data.extend_from_slice(&px);
            }
        }

        RgbaFrame {
            data,
            width,
            height,
        }
    }

    /// Wrap the raw pixels without compression.
    pub fn into_encoded(self) -> EncodedImage {
        EncodedImage {
            format: ImageFormat::Rgba8,
            width: self.width,
            height: self.height,
            bytes: self.data,
        }
    }

    /// Encode as PNG.
    #[cfg(feature = "png")]
    pub fn encode_png(&self) -> Result<EncodedImage, CaptureError> {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);

            let mut writer = encoder
                .write_header()
                .map_err(|e| CaptureError::Failed(e.to_string()))?;
            writer
                .write_image_data(&self.data)
                .map_err(|e| CaptureError::Failed(e.to_string()))?;
        }

        Ok(EncodedImage {
            format: ImageFormat::Png,
            width: self.width,
            height: self.height,
            bytes,
        })
    }
}
