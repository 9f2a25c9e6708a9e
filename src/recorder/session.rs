//! Recording session
//!
//! Owns the output container while a recording runs and maps irregular frame
//! arrival onto a gap-free synthetic timeline: frame slot `n` is always stamped
//! `n × frame_duration`, whether or not the frame in that slot was written.

use super::container::{
    ContainerFactory, ContainerSpec, ContainerWriter, MetadataTrackConfig, RecordingError,
    RecordingResult, VideoCodec, VideoTrackConfig,
};
use super::state::{AtomicRecordingState, RecordingConfig, RecordingState, RecordingSummary};
use super::storage::StorageSink;
use crate::annotation::{FrameAnnotation, MetadataEncoder};
use crate::capture::frame::{DepthData, PixelBuffer};
use crate::media_time::MediaTime;
use chrono::Utc;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Codec of every recording's primary track
pub const PRIMARY_CODEC: VideoCodec = VideoCodec::Png;

/// Extension of allocated output targets
pub const OUTPUT_EXTENSION: &str = "dcap";

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Container opened, frames are being accepted
    Started { target: PathBuf },
    /// No more frames are accepted, finalize is running
    Stopping,
    /// Finalize succeeded
    Finished(RecordingSummary),
    /// Finalize failed; the session is idle again
    Failed(String),
}

/// Per-recording state, present only between Starting→Active and Finishing
struct ActiveRecording {
    writer: Box<dyn ContainerWriter>,
    target: PathBuf,
    cursor: MediaTime,
    frames_written: u64,
    frames_dropped: u64,
}

/// Wait handle for a finalize running in the background
pub struct FinalizeHandle {
    thread: Option<JoinHandle<()>>,
}

impl FinalizeHandle {
    /// Block until finalize (and the storage hand-off) completed
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Finalize thread panicked");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }
}

/// The recording state machine
///
/// `start`/`stop` may be called from any thread; `append_frame` is called from
/// the delivery worker.
pub struct RecordingSession {
    state: Arc<AtomicRecordingState>,
    config: RecordingConfig,
    factory: Arc<dyn ContainerFactory>,
    storage: Option<Arc<dyn StorageSink>>,
    /// Guards the container. State changes into and out of Active happen while
    /// this lock is held, so a writer holding it sees a stable state.
    recording: Mutex<Option<ActiveRecording>>,
    stop_requested: AtomicBool,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingSession {
    /// Create an idle session
    pub fn new(config: RecordingConfig, factory: Arc<dyn ContainerFactory>) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(AtomicRecordingState::default()),
            config,
            factory,
            storage: None,
            recording: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
            event_tx,
        }
    }

    /// Hand finished outputs to `storage`
    pub fn with_storage(mut self, storage: Arc<dyn StorageSink>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn state(&self) -> RecordingState {
        self.state.load()
    }

    pub fn is_active(&self) -> bool {
        self.state.load() == RecordingState::Active
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Presentation time the next frame slot will be stamped with
    pub fn timeline_cursor(&self) -> Option<MediaTime> {
        self.recording.lock().as_ref().map(|r| r.cursor)
    }

    /// Open a fresh container and begin accepting frames
    pub fn start(&self) -> RecordingResult<()> {
        let starting = self.state.transition(RecordingState::Idle, RecordingState::Starting);
        if let Err(current) = starting {
            return Err(match current {
                RecordingState::Finishing => RecordingError::Busy,
                other => RecordingError::AlreadyRecording(other),
            });
        }
        self.stop_requested.store(false, Ordering::SeqCst);

        let target = match self.allocate_target() {
            Ok(target) => target,
            Err(e) => return Err(self.abort_start(e)),
        };

        tracing::info!("Starting recording to: {:?}", target);

        let spec = ContainerSpec {
            target: target.clone(),
            video: VideoTrackConfig {
                codec: PRIMARY_CODEC,
                width: self.config.video_size,
                height: self.config.video_size,
                frame_duration: self.config.frame_duration(),
            },
            metadata: MetadataTrackConfig::default(),
            queue_depth: self.config.writer_queue_depth,
        };

        let writer = match self.factory.create(&spec) {
            Ok(writer) => writer,
            Err(e) => return Err(self.abort_start(e)),
        };

        {
            let mut guard = self.recording.lock();
            *guard = Some(ActiveRecording {
                writer,
                target: target.clone(),
                cursor: MediaTime::new(0, self.config.frame_rate),
                frames_written: 0,
                frames_dropped: 0,
            });
            let active = self.state.transition(RecordingState::Starting, RecordingState::Active);
            if let Err(current) = active {
                // Nothing else moves the state out of Starting
                tracing::error!("Unexpected state {} while starting", current);
                guard.take();
                return Err(RecordingError::StartFailed(format!("unexpected state {current}")));
            }
        }

        let _ = self.event_tx.send(RecordingEvent::Started { target });
        tracing::info!("Recording started");

        if self.stop_requested.swap(false, Ordering::SeqCst) {
            tracing::info!("Honouring stop requested while starting");
            self.stop();
        }
        Ok(())
    }

    fn allocate_target(&self) -> RecordingResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let name = format!(
            "capture-{}-{}.{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            Uuid::new_v4().simple(),
            OUTPUT_EXTENSION
        );
        Ok(self.config.output_dir.join(name))
    }

    fn abort_start(&self, cause: RecordingError) -> RecordingError {
        tracing::error!("Failed to start recording: {}", cause);
        let _ = self.state.transition(RecordingState::Starting, RecordingState::Idle);
        self.stop_requested.store(false, Ordering::SeqCst);
        RecordingError::StartFailed(cause.to_string())
    }

    /// Offer one frame to the recording
    ///
    /// Ignored unless Active. When the container is not ready the frame and
    /// its annotation are dropped, but the timeline still advances. Returns
    /// whether the frame was written.
    pub fn append_frame(&self, color: &PixelBuffer, depth: &DepthData) -> bool {
        if self.state.load() != RecordingState::Active {
            return false;
        }

        let mut guard = self.recording.lock();
        if self.state.load() != RecordingState::Active {
            return false;
        }
        let Some(recording) = guard.as_mut() else {
            return false;
        };

        let time = recording.cursor;
        recording.cursor = time + self.config.frame_duration();

        if !recording.writer.is_ready_for_more_data() {
            recording.frames_dropped += 1;
            tracing::debug!("Writer not ready, dropping frame at {}", time);
            return false;
        }

        if let Err(e) = recording.writer.append_video(color, time) {
            recording.frames_dropped += 1;
            tracing::warn!("Failed to append video frame at {}: {}", time, e);
            return false;
        }

        let annotation = FrameAnnotation {
            presentation_time: time,
            payload: MetadataEncoder::encode(depth),
        };
        if let Err(e) = recording.writer.append_annotation(annotation) {
            tracing::warn!("Failed to append annotation at {}: {}", time, e);
        }
        recording.frames_written += 1;
        true
    }

    /// Stop accepting frames and finalize in the background
    ///
    /// No-op while Idle or Finishing. While Starting, the stop is latched and
    /// performed as soon as the session becomes Active.
    pub fn stop(&self) -> Option<FinalizeHandle> {
        match self.state.load() {
            RecordingState::Idle | RecordingState::Finishing => return None,
            RecordingState::Starting => {
                self.stop_requested.store(true, Ordering::SeqCst);
                if self.state.load() != RecordingState::Active {
                    tracing::info!("Stop requested while starting; deferring");
                    return None;
                }
            }
            RecordingState::Active => {}
        }

        let recording = {
            let mut guard = self.recording.lock();
            if self.state.transition(RecordingState::Active, RecordingState::Finishing).is_err() {
                return None;
            }
            guard.take()
        };
        self.stop_requested.store(false, Ordering::SeqCst);

        let Some(recording) = recording else {
            let _ = self.state.transition(RecordingState::Finishing, RecordingState::Idle);
            return None;
        };

        tracing::info!("Stopping recording");
        let _ = self.event_tx.send(RecordingEvent::Stopping);

        let finalizer = Finalizer {
            state: self.state.clone(),
            storage: self.storage.clone(),
            event_tx: self.event_tx.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name("recording-finalize".to_string())
            .spawn({
                let finalizer = finalizer.clone();
                move || finalizer.run(recording)
            });

        match spawned {
            Ok(thread) => Some(FinalizeHandle { thread: Some(thread) }),
            Err(e) => {
                // The writer moved into the failed closure and is gone with it
                tracing::error!("Failed to spawn finalize thread: {}", e);
                let _ = finalizer.state.transition(RecordingState::Finishing, RecordingState::Idle);
                let _ = finalizer.event_tx.send(RecordingEvent::Failed(e.to_string()));
                None
            }
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(handle) = self.stop() {
            handle.wait();
        }
    }
}

/// What the finalize thread needs from the session
#[derive(Clone)]
struct Finalizer {
    state: Arc<AtomicRecordingState>,
    storage: Option<Arc<dyn StorageSink>>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl Finalizer {
    fn run(self, recording: ActiveRecording) {
        let ActiveRecording {
            writer,
            target,
            cursor,
            frames_written,
            frames_dropped,
        } = recording;

        let result = writer.finish();
        let _ = self.state.transition(RecordingState::Finishing, RecordingState::Idle);

        match result {
            Ok(output) => {
                tracing::info!(
                    "Recording finished: {} frames written, {} dropped, {:.2}s",
                    frames_written,
                    frames_dropped,
                    cursor.as_secs_f64()
                );
                if let Some(storage) = &self.storage {
                    if let Err(e) = storage.store(&output) {
                        tracing::error!("Failed to hand off recording {:?}: {:#}", output, e);
                    }
                }
                let _ = self.event_tx.send(RecordingEvent::Finished(RecordingSummary {
                    output,
                    frames_written,
                    frames_dropped,
                    duration: cursor,
                }));
            }
            Err(e) => {
                tracing::error!("Failed to finalize recording {:?}: {}", target, e);
                let _ = self.event_tx.send(RecordingEvent::Failed(e.to_string()));
            }
        }
    }
}
