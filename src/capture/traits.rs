//! Capture trait definitions
//!
//! Platform-agnostic descriptions of the sensor and the controls the core
//! needs from it.

use super::frame::{DepthFormat, PixelFormat};
use serde::{Deserialize, Serialize};

/// A color format the device can stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorFormatInfo {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    pub pixel_format: PixelFormat,

    /// Highest supported frame rate
    pub max_frame_rate: u32,

    /// Depth formats that can run alongside this color format
    pub depth_formats: Vec<DepthFormatInfo>,
}

/// A depth format paired with a color format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthFormatInfo {
    pub width: u32,
    pub height: u32,
    pub format: DepthFormat,
}

/// Information about a depth-capable camera
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Color formats the device supports
    pub color_formats: Vec<ColorFormatInfo>,
}

/// Live control over the depth stream
pub trait DepthStreamControl: Send + Sync {
    /// Toggle temporal smoothing / hole filling on the depth output
    fn set_filtering_enabled(&self, enabled: bool);

    fn is_filtering_enabled(&self) -> bool;
}
