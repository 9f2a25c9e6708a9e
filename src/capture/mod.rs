//! Sensor-facing types
//!
//! Sample and delivery types produced by the hardware layer, device
//! descriptions, and format selection.

pub mod frame;
pub mod setup;
pub mod traits;

pub use frame::{
    CalibrationData, CapturedFramePair, ColorSample, DepthData, DepthFormat, DepthSample,
    Dimensions, DropReason, DualDelivery, PixelBuffer, PixelFormat, SampleDelivery,
};
pub use setup::{select_profile, SensorProfile, SetupError};
pub use traits::{ColorFormatInfo, DepthFormatInfo, DepthStreamControl, DeviceInfo};
