//! Sensor sample types
//!
//! Color frames, depth maps, calibration data, and the synchronized pair the
//! synchronizer builds from them.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Pixel layout of a color buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Bgra8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        4
    }
}

/// An immutable color image from the sensor
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: usize,
    pub format: PixelFormat,
    pub data: Bytes,
}

impl PixelBuffer {
    /// Create a tightly packed buffer
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            bytes_per_row: width as usize * format.bytes_per_pixel(),
            format,
            data: data.into(),
        }
    }

    /// Whether `data` is large enough for the declared geometry
    pub fn is_complete(&self) -> bool {
        let row = self.width as usize * self.format.bytes_per_pixel();
        self.bytes_per_row >= row && self.data.len() >= self.bytes_per_row * self.height as usize
    }

    /// RGBA value of the pixel at (x, y)
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = y as usize * self.bytes_per_row + x as usize * 4;
        let px = &self.data[offset..offset + 4];
        match self.format {
            PixelFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
            PixelFormat::Rgba8 => [px[0], px[1], px[2], px[3]],
        }
    }
}

/// How depth samples are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DepthFormat {
    /// Distance in meters
    Depth32,
    /// Inverse distance (1/m)
    Disparity32,
}

/// Camera calibration attached to a depth sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationData {
    /// Row-major 3x3 intrinsic matrix (fx, 0, cx / 0, fy, cy / 0, 0, 1)
    pub intrinsic_matrix: [[f32; 3]; 3],

    /// Image dimensions the intrinsics are expressed against
    pub reference_dimensions: Dimensions,

    /// Size of one sensor pixel in millimeters
    pub pixel_size_mm: f32,

    /// Optical center used for lens distortion, in reference pixels
    pub lens_distortion_center: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A depth map snapshot
#[derive(Debug, Clone)]
pub struct DepthData {
    pub width: u32,
    pub height: u32,
    pub format: DepthFormat,
    pub values: Arc<[f32]>,
    pub calibration: Option<CalibrationData>,
}

impl DepthData {
    pub fn new(width: u32, height: u32, format: DepthFormat, values: Vec<f32>) -> Self {
        Self {
            width,
            height,
            format,
            values: values.into(),
            calibration: None,
        }
    }

    pub fn with_calibration(mut self, calibration: CalibrationData) -> Self {
        self.calibration = Some(calibration);
        self
    }
}

/// Color side of a dual delivery
#[derive(Debug, Clone)]
pub struct ColorSample {
    pub buffer: PixelBuffer,
    /// Sensor clock timestamp
    pub timestamp: Duration,
}

/// Depth side of a dual delivery
#[derive(Debug, Clone)]
pub struct DepthSample {
    pub depth: DepthData,
    pub timestamp: Duration,
}

/// Why the hardware dropped a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    LateData,
    OutOfBuffers,
    Discontinuity,
}

/// One side of a dual delivery
#[derive(Debug, Clone)]
pub enum SampleDelivery<T> {
    Captured(T),
    Dropped(DropReason),
}

impl<T> SampleDelivery<T> {
    pub fn captured(&self) -> Option<&T> {
        match self {
            SampleDelivery::Captured(sample) => Some(sample),
            SampleDelivery::Dropped(_) => None,
        }
    }

    pub fn into_captured(self) -> Option<T> {
        match self {
            SampleDelivery::Captured(sample) => Some(sample),
            SampleDelivery::Dropped(_) => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, SampleDelivery::Dropped(_))
    }
}

/// One synchronized hardware notification
///
/// Either side may be missing when the hardware could not match it.
#[derive(Debug, Clone)]
pub struct DualDelivery {
    pub color: Option<SampleDelivery<ColorSample>>,
    pub depth: Option<SampleDelivery<DepthSample>>,
}

impl DualDelivery {
    pub fn new(color: ColorSample, depth: DepthSample) -> Self {
        Self {
            color: Some(SampleDelivery::Captured(color)),
            depth: Some(SampleDelivery::Captured(depth)),
        }
    }
}

/// Matched color + depth with the calibration needed to unproject depth
#[derive(Debug, Clone)]
pub struct CapturedFramePair {
    pub color: PixelBuffer,
    pub depth: DepthData,
    pub intrinsic_matrix: [[f32; 3]; 3],
    pub reference_dimensions: Dimensions,
    pub capture_instant: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_is_swizzled() {
        let buffer = PixelBuffer::new(1, 1, PixelFormat::Bgra8, vec![10u8, 20, 30, 255]);
        assert_eq!(buffer.rgba_at(0, 0), [30, 20, 10, 255]);
    }

    #[test]
    fn test_incomplete_buffer() {
        let buffer = PixelBuffer::new(2, 2, PixelFormat::Rgba8, vec![0u8; 12]);
        assert!(!buffer.is_complete());
    }
}
