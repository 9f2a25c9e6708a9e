//! Per-frame annotation track
//!
//! Each recorded video frame carries one annotation derived from its depth
//! snapshot, written at the frame's presentation time.

mod encoder;

pub use encoder::{DepthAnnotation, DepthStatistics, MetadataEncoder, PAYLOAD_VERSION};

use crate::media_time::MediaTime;

/// Key the metadata track is tagged with
pub const ANNOTATION_KEY: &str = "mdta/depth-capture.frame-annotation";

/// Content type of annotation payloads
pub const ANNOTATION_CONTENT_TYPE: &str = "application/vnd.depth-capture.annotation+json";

/// One annotation sample
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnnotation {
    pub presentation_time: MediaTime,
    pub payload: Vec<u8>,
}
