//! Output container abstraction
//!
//! The session drives a container through these traits; the concrete format
//! (on-disk bundle, in-memory, ...) lives behind a [`ContainerFactory`].

use crate::annotation::{FrameAnnotation, ANNOTATION_CONTENT_TYPE, ANNOTATION_KEY};
use crate::capture::frame::PixelBuffer;
use crate::media_time::MediaTime;
use crate::recorder::state::RecordingState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Recording-related errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Recording already in progress (state: {0})")]
    AlreadyRecording(RecordingState),

    #[error("Previous recording is still finalizing")]
    Busy,

    #[error("Not recording")]
    NotRecording,

    #[error("Failed to start recording: {0}")]
    StartFailed(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Finalize failed: {0}")]
    FinalizeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Codec of the primary track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// Lossless per-frame PNG
    Png,
}

impl VideoCodec {
    pub fn fourcc(&self) -> &'static str {
        match self {
            VideoCodec::Png => "png ",
        }
    }
}

/// Primary track settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTrackConfig {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    pub frame_duration: MediaTime,
}

/// Metadata track settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataTrackConfig {
    pub key: String,
    pub content_type: String,
    /// Samples are delivered once per video frame at the frame's time
    pub frame_aligned: bool,
}

impl Default for MetadataTrackConfig {
    fn default() -> Self {
        Self {
            key: ANNOTATION_KEY.to_string(),
            content_type: ANNOTATION_CONTENT_TYPE.to_string(),
            frame_aligned: true,
        }
    }
}

/// Everything a factory needs to open a container
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Where the container is written
    pub target: PathBuf,
    pub video: VideoTrackConfig,
    pub metadata: MetadataTrackConfig,
    /// Frames that may be buffered before the writer reports not-ready
    pub queue_depth: usize,
}

/// Opens containers for a recording session
pub trait ContainerFactory: Send + Sync {
    /// Allocate `spec.target` and configure both tracks
    fn create(&self, spec: &ContainerSpec) -> RecordingResult<Box<dyn ContainerWriter>>;
}

/// An open container with one video track and one metadata track
pub trait ContainerWriter: Send {
    /// False while the primary track cannot accept another frame
    fn is_ready_for_more_data(&self) -> bool;

    fn append_video(&mut self, frame: &PixelBuffer, time: MediaTime) -> RecordingResult<()>;

    fn append_annotation(&mut self, annotation: FrameAnnotation) -> RecordingResult<()>;

    /// Flush and close; returns the finished output location
    ///
    /// May block. Called off the delivery worker.
    fn finish(self: Box<Self>) -> RecordingResult<PathBuf>;
}
