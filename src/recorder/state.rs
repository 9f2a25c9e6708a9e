//! Recording state management
//!
//! Defines the recording state machine and the configuration/summary types
//! that travel with a recording.

use crate::capture::setup::SensorProfile;
use crate::media_time::MediaTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};

/// Current state of the recording system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    Idle,
    /// Container is being allocated and configured
    Starting,
    /// Frames are being written
    Active,
    /// Container is being finalized
    Finishing,
}

impl RecordingState {
    /// Whether `self -> target` is a legal transition
    pub fn can_transition_to(&self, target: RecordingState) -> bool {
        use RecordingState::*;

        matches!(
            (self, target),
            (Idle, Starting)
                | (Starting, Active)
                | (Starting, Idle)
                | (Active, Finishing)
                | (Finishing, Idle)
        )
    }

    fn as_u8(self) -> u8 {
        match self {
            RecordingState::Idle => 0,
            RecordingState::Starting => 1,
            RecordingState::Active => 2,
            RecordingState::Finishing => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => RecordingState::Starting,
            2 => RecordingState::Active,
            3 => RecordingState::Finishing,
            _ => RecordingState::Idle,
        }
    }
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordingState::Idle => "idle",
            RecordingState::Starting => "starting",
            RecordingState::Active => "active",
            RecordingState::Finishing => "finishing",
        };
        f.write_str(name)
    }
}

/// Lock-free cell holding a [`RecordingState`]
///
/// Readers on the delivery worker see either the old or the new state, never
/// anything in between. Writes only go through [`AtomicRecordingState::transition`].
#[derive(Debug, Default)]
pub struct AtomicRecordingState(AtomicU8);

impl AtomicRecordingState {
    pub fn load(&self) -> RecordingState {
        RecordingState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from -> to` if the current state is `from`
    ///
    /// Returns the state observed on failure. Illegal edges are refused
    /// without touching the cell.
    pub fn transition(
        &self,
        from: RecordingState,
        to: RecordingState,
    ) -> Result<(), RecordingState> {
        if !from.can_transition_to(to) {
            return Err(self.load());
        }
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(RecordingState::from_u8)
    }
}

/// Configuration for starting a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Directory new output targets are created in
    pub output_dir: PathBuf,

    /// Edge length of the square video track
    pub video_size: u32,

    /// Nominal frame rate of the synthetic timeline
    pub frame_rate: u32,

    /// Frames the container may buffer before reporting backpressure
    pub writer_queue_depth: usize,
}

impl RecordingConfig {
    pub fn for_profile(output_dir: impl Into<PathBuf>, profile: &SensorProfile) -> Self {
        Self {
            output_dir: output_dir.into(),
            video_size: profile.preferred_width(),
            frame_rate: profile.frame_rate,
            writer_queue_depth: 8,
        }
    }

    /// Spacing between consecutive output frames
    pub fn frame_duration(&self) -> MediaTime {
        MediaTime::frame_duration(self.frame_rate)
    }
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    /// Path to the finished container
    pub output: PathBuf,

    /// Video frames (and annotations) written
    pub frames_written: u64,

    /// Frame slots skipped because the writer was not ready
    pub frames_dropped: u64,

    /// Length of the synthetic timeline
    pub duration: MediaTime,
}
