//! In-memory container
//!
//! Keeps frame timing and annotations in memory instead of encoding them.
//! Used for live previews of the recording timeline and in tests, where the
//! readiness signal can be scripted per frame attempt.

use super::container::{
    ContainerFactory, ContainerSpec, ContainerWriter, RecordingError, RecordingResult,
    VideoTrackConfig,
};
use crate::annotation::FrameAnnotation;
use crate::capture::frame::{Dimensions, PixelBuffer};
use crate::media_time::MediaTime;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Readiness = dyn Fn(u64) -> bool + Send + Sync;

/// What one container received
#[derive(Debug, Clone)]
pub struct MemoryRecording {
    pub target: PathBuf,
    pub video: VideoTrackConfig,
    pub frame_times: Vec<MediaTime>,
    pub frame_sizes: Vec<Dimensions>,
    pub annotations: Vec<FrameAnnotation>,
    pub finished: bool,
}

/// Factory for [`MemoryContainer`]s
pub struct MemoryContainerFactory {
    recordings: Arc<Mutex<Vec<MemoryRecording>>>,
    readiness: Arc<Readiness>,
    fail_create: AtomicBool,
    fail_finish: Arc<AtomicBool>,
}

impl MemoryContainerFactory {
    /// A factory whose containers are always ready
    pub fn new() -> Self {
        Self::with_readiness(|_| true)
    }

    /// `readiness(n)` answers the n-th readiness query of each container
    /// (one query per frame offered while Active)
    pub fn with_readiness(readiness: impl Fn(u64) -> bool + Send + Sync + 'static) -> Self {
        Self {
            recordings: Arc::new(Mutex::new(Vec::new())),
            readiness: Arc::new(readiness),
            fail_create: AtomicBool::new(false),
            fail_finish: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make subsequent `create` calls fail
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `finish` calls fail
    pub fn fail_finish(&self, fail: bool) {
        self.fail_finish.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every container opened so far
    pub fn recordings(&self) -> Vec<MemoryRecording> {
        self.recordings.lock().clone()
    }
}

impl Default for MemoryContainerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerFactory for MemoryContainerFactory {
    fn create(&self, spec: &ContainerSpec) -> RecordingResult<Box<dyn ContainerWriter>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RecordingError::ConfigurationError(
                "memory container refused configuration".to_string(),
            ));
        }

        let mut recordings = self.recordings.lock();
        recordings.push(MemoryRecording {
            target: spec.target.clone(),
            video: spec.video.clone(),
            frame_times: Vec::new(),
            frame_sizes: Vec::new(),
            annotations: Vec::new(),
            finished: false,
        });

        Ok(Box::new(MemoryContainer {
            index: recordings.len() - 1,
            recordings: self.recordings.clone(),
            readiness: self.readiness.clone(),
            queries: Mutex::new(0),
            fail_finish: self.fail_finish.clone(),
        }))
    }
}

/// Writer half of the in-memory container
pub struct MemoryContainer {
    index: usize,
    recordings: Arc<Mutex<Vec<MemoryRecording>>>,
    readiness: Arc<Readiness>,
    queries: Mutex<u64>,
    fail_finish: Arc<AtomicBool>,
}

impl ContainerWriter for MemoryContainer {
    fn is_ready_for_more_data(&self) -> bool {
        let mut queries = self.queries.lock();
        let attempt = *queries;
        *queries += 1;
        (self.readiness)(attempt)
    }

    fn append_video(&mut self, frame: &PixelBuffer, time: MediaTime) -> RecordingResult<()> {
        let mut recordings = self.recordings.lock();
        let recording = &mut recordings[self.index];
        recording.frame_times.push(time);
        recording.frame_sizes.push(Dimensions {
            width: frame.width,
            height: frame.height,
        });
        Ok(())
    }

    fn append_annotation(&mut self, annotation: FrameAnnotation) -> RecordingResult<()> {
        self.recordings.lock()[self.index].annotations.push(annotation);
        Ok(())
    }

    fn finish(self: Box<Self>) -> RecordingResult<PathBuf> {
        if self.fail_finish.load(Ordering::SeqCst) {
            return Err(RecordingError::FinalizeFailed(
                "memory container refused to finish".to_string(),
            ));
        }
        let mut recordings = self.recordings.lock();
        let recording = &mut recordings[self.index];
        recording.finished = true;
        Ok(recording.target.clone())
    }
}
