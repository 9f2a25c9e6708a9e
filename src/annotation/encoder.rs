//! Depth snapshot → annotation payload
//!
//! The payload is a JSON object so that readers can decode it without
//! out-of-band schema information. Raw samples ride along as base64 of
//! little-endian f32 values.

use crate::capture::frame::{CalibrationData, DepthData, DepthFormat};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Payload schema version
pub const PAYLOAD_VERSION: u32 = 1;

/// Decoded form of an annotation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthAnnotation {
    pub version: u32,
    pub format: DepthFormat,
    pub width: u32,
    pub height: u32,
    pub calibration: Option<CalibrationData>,
    pub statistics: DepthStatistics,
    /// Base64 of little-endian f32 samples, row-major
    pub samples: String,
}

impl DepthAnnotation {
    /// Decode the `samples` field back into floats
    pub fn decode_samples(&self) -> Option<Vec<f32>> {
        let raw = BASE64.decode(&self.samples).ok()?;
        if raw.len() % 4 != 0 {
            return None;
        }
        Some(
            raw.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        )
    }
}

/// Summary over the valid (finite, positive) samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthStatistics {
    pub valid_count: u64,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub mean: Option<f32>,
}

/// Turns depth snapshots into annotation payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataEncoder;

impl MetadataEncoder {
    /// Encode one depth snapshot
    ///
    /// Total: every input, including an empty or mis-sized depth map, yields a
    /// well-formed payload.
    pub fn encode(depth: &DepthData) -> Vec<u8> {
        let annotation = DepthAnnotation {
            version: PAYLOAD_VERSION,
            format: depth.format,
            width: depth.width,
            height: depth.height,
            calibration: depth.calibration.clone().filter(calibration_is_finite),
            statistics: compute_statistics(&depth.values),
            samples: BASE64.encode(sample_bytes(&depth.values)),
        };

        match serde_json::to_vec(&annotation) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Annotation serialization failed, writing minimal payload: {}", e);
                minimal_payload(depth)
            }
        }
    }

    /// Parse a payload produced by [`MetadataEncoder::encode`]
    pub fn decode(payload: &[u8]) -> Result<DepthAnnotation, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

fn sample_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Min/max/mean over samples that represent a real measurement
fn compute_statistics(values: &[f32]) -> DepthStatistics {
    let mut valid_count = 0u64;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0f64;

    for &v in values.iter().filter(|v| v.is_finite() && **v > 0.0) {
        valid_count += 1;
        min = min.min(v);
        max = max.max(v);
        sum += v as f64;
    }

    if valid_count == 0 {
        return DepthStatistics {
            valid_count,
            min: None,
            max: None,
            mean: None,
        };
    }

    DepthStatistics {
        valid_count,
        min: Some(min),
        max: Some(max),
        mean: Some((sum / valid_count as f64) as f32),
    }
}

// serde_json writes non-finite floats as null, which would not decode back
// into f32, so such calibration is omitted
fn calibration_is_finite(calibration: &CalibrationData) -> bool {
    calibration.intrinsic_matrix.iter().flatten().all(|v| v.is_finite())
        && calibration.pixel_size_mm.is_finite()
        && calibration.lens_distortion_center.iter().all(|v| v.is_finite())
}

fn minimal_payload(depth: &DepthData) -> Vec<u8> {
    let format = match depth.format {
        DepthFormat::Depth32 => "depth32",
        DepthFormat::Disparity32 => "disparity32",
    };
    format!(
        "{{\"version\":{},\"format\":\"{}\",\"width\":{},\"height\":{},\"calibration\":null,\
         \"statistics\":{{\"validCount\":0,\"min\":null,\"max\":null,\"mean\":null}},\
         \"samples\":\"\"}}",
        PAYLOAD_VERSION, format, depth.width, depth.height
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::Dimensions;

    fn calibration() -> CalibrationData {
        CalibrationData {
            intrinsic_matrix: [[500.0, 0.0, 320.0], [0.0, 500.0, 240.0], [0.0, 0.0, 1.0]],
            reference_dimensions: Dimensions { width: 640, height: 480 },
            pixel_size_mm: 0.0014,
            lens_distortion_center: [320.0, 240.0],
        }
    }

    #[test]
    fn test_encode_empty_depth() {
        let depth = DepthData::new(0, 0, DepthFormat::Depth32, Vec::<f32>::new());
        let payload = MetadataEncoder::encode(&depth);
        let decoded = MetadataEncoder::decode(&payload).unwrap();

        assert_eq!(decoded.version, PAYLOAD_VERSION);
        assert_eq!(decoded.statistics.valid_count, 0);
        assert_eq!(decoded.statistics.mean, None);
        assert_eq!(decoded.decode_samples().unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn test_encode_skips_invalid_samples_in_statistics() {
        let depth = DepthData::new(2, 2, DepthFormat::Depth32, vec![1.0, f32::NAN, 0.0, 3.0])
            .with_calibration(calibration());
        let decoded = MetadataEncoder::decode(&MetadataEncoder::encode(&depth)).unwrap();

        assert_eq!(decoded.statistics.valid_count, 2);
        assert_eq!(decoded.statistics.min, Some(1.0));
        assert_eq!(decoded.statistics.max, Some(3.0));
        assert_eq!(decoded.statistics.mean, Some(2.0));
        assert_eq!(decoded.calibration, Some(calibration()));

        let samples = decoded.decode_samples().unwrap();
        assert_eq!(samples.len(), 4);
        assert!(samples[1].is_nan());
    }

    #[test]
    fn test_non_finite_calibration_is_dropped() {
        let mut bad = calibration();
        bad.pixel_size_mm = f32::INFINITY;
        let depth = DepthData::new(1, 1, DepthFormat::Disparity32, vec![0.5]).with_calibration(bad);
        let decoded = MetadataEncoder::decode(&MetadataEncoder::encode(&depth)).unwrap();
        assert_eq!(decoded.calibration, None);
        assert_eq!(decoded.format, DepthFormat::Disparity32);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let depth = DepthData::new(2, 1, DepthFormat::Depth32, vec![1.5, 2.5]);
        assert_eq!(MetadataEncoder::encode(&depth), MetadataEncoder::encode(&depth));
    }
}
