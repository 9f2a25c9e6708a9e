//! One-time sensor validation
//!
//! Picks the color/depth format pair the recorder runs against. A device that
//! cannot provide depth alongside the requested color stream is a hard error;
//! there is no silent fallback.

use super::frame::{DepthFormat, PixelFormat};
use super::traits::{ColorFormatInfo, DepthFormatInfo, DeviceInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Setup-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("No depth-capable camera available")]
    DeviceUnavailable,

    #[error("No color format supports {0} fps")]
    NoColorFormat(u32),

    #[error("No depth format pairs with color format {width}x{height}")]
    NoDepthFormat { width: u32, height: u32 },
}

/// The formats selected for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorProfile {
    pub device_id: String,
    pub color_width: u32,
    pub color_height: u32,
    pub pixel_format: PixelFormat,
    pub depth_width: u32,
    pub depth_height: u32,
    pub depth_format: DepthFormat,
    pub frame_rate: u32,
}

impl SensorProfile {
    /// Edge length of the square recorded video
    pub fn preferred_width(&self) -> u32 {
        self.color_width
    }
}

/// Select formats on `device` for capture at `frame_rate`
///
/// Prefers the largest color format that has at least one depth pairing, and
/// for that color format the largest metric depth format (disparity only when
/// no metric format exists).
pub fn select_profile(
    device: Option<&DeviceInfo>,
    frame_rate: u32,
) -> Result<SensorProfile, SetupError> {
    let device = device.ok_or(SetupError::DeviceUnavailable)?;

    let mut candidates: Vec<&ColorFormatInfo> = device
        .color_formats
        .iter()
        .filter(|f| f.max_frame_rate >= frame_rate)
        .collect();
    if candidates.is_empty() {
        return Err(SetupError::NoColorFormat(frame_rate));
    }
    candidates.sort_by_key(|f| std::cmp::Reverse(f.width as u64 * f.height as u64));

    let color = candidates
        .iter()
        .find(|f| !f.depth_formats.is_empty())
        .ok_or(SetupError::NoDepthFormat {
            width: candidates[0].width,
            height: candidates[0].height,
        })?;

    let depth = best_depth_format(&color.depth_formats).ok_or(SetupError::NoDepthFormat {
        width: color.width,
        height: color.height,
    })?;

    tracing::info!(
        "Selected {}x{} color with {}x{} {:?} depth @ {}fps on {}",
        color.width,
        color.height,
        depth.width,
        depth.height,
        depth.format,
        frame_rate,
        device.name
    );

    Ok(SensorProfile {
        device_id: device.id.clone(),
        color_width: color.width,
        color_height: color.height,
        pixel_format: color.pixel_format,
        depth_width: depth.width,
        depth_height: depth.height,
        depth_format: depth.format,
        frame_rate,
    })
}

fn best_depth_format(formats: &[DepthFormatInfo]) -> Option<&DepthFormatInfo> {
    formats.iter().max_by_key(|f| {
        let metric = matches!(f.format, DepthFormat::Depth32);
        (metric, f.width as u64 * f.height as u64)
    })
}
