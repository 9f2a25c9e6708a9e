//! Recording bundle read/write operations
//!
//! A bundle is a directory (`*.dcap`) containing:
//! - manifest.json: track configuration and sample counts, written on finish
//! - video.track: primary track, one PNG per frame
//! - metadata.track: one annotation per video frame at the same time
//!
//! Frames are encoded on a dedicated writer thread. The number of frames
//! waiting for that thread is the container's backpressure signal.

use super::container::{
    ContainerFactory, ContainerSpec, ContainerWriter, MetadataTrackConfig, RecordingError,
    RecordingResult, VideoCodec, VideoTrackConfig,
};
use super::track::{read_track, TrackSample, TrackWriter};
use crate::annotation::FrameAnnotation;
use crate::capture::frame::PixelBuffer;
use crate::media_time::MediaTime;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VIDEO_TRACK_FILE: &str = "video.track";
pub const METADATA_TRACK_FILE: &str = "metadata.track";

/// Manifest schema version
pub const BUNDLE_VERSION: u32 = 1;

/// Bundle-related errors
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PNG error: {0}")]
    Png(String),

    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("Missing required file: {0}")]
    MissingFile(String),
}

/// Contents of manifest.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub video: VideoTrackConfig,
    pub metadata: MetadataTrackConfig,
    pub video_sample_count: u64,
    pub metadata_sample_count: u64,
    /// End of the last frame on the presentation timeline
    pub duration: MediaTime,
}

/// A bundle loaded back from disk
#[derive(Debug, Clone)]
pub struct RecordedBundle {
    pub manifest: BundleManifest,
    pub video: Vec<TrackSample>,
    pub metadata: Vec<TrackSample>,
}

/// Decoded video frame
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels
    pub data: Vec<u8>,
}

/// Opens [`BundleWriter`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct BundleContainerFactory;

impl ContainerFactory for BundleContainerFactory {
    fn create(&self, spec: &ContainerSpec) -> RecordingResult<Box<dyn ContainerWriter>> {
        Ok(Box::new(BundleWriter::create(spec)?))
    }
}

enum WriterCommand {
    Video { frame: PixelBuffer, time: MediaTime },
    Annotation(FrameAnnotation),
}

struct TrackCounts {
    video: u64,
    metadata: u64,
    last_time: Option<MediaTime>,
}

/// Container writer backed by a bundle directory
pub struct BundleWriter {
    target: PathBuf,
    video: VideoTrackConfig,
    metadata: MetadataTrackConfig,
    queue_depth: usize,
    pending: Arc<AtomicUsize>,
    encoded: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<String>>>,
    commands: Option<mpsc::Sender<WriterCommand>>,
    thread: Option<JoinHandle<Result<TrackCounts, BundleError>>>,
}

impl BundleWriter {
    /// Create the bundle directory and both track files
    pub fn create(spec: &ContainerSpec) -> RecordingResult<Self> {
        if spec.video.width == 0 || spec.video.height == 0 {
            return Err(RecordingError::ConfigurationError(format!(
                "Invalid video size {}x{}",
                spec.video.width, spec.video.height
            )));
        }
        if spec.video.codec != VideoCodec::Png {
            return Err(RecordingError::ConfigurationError(format!(
                "Unsupported codec {:?}",
                spec.video.codec
            )));
        }

        // create_dir (not _all) so an existing target is never reused
        if let Some(parent) = spec.target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(&spec.target)?;

        let tracks = TrackWriter::create(&spec.target.join(VIDEO_TRACK_FILE)).and_then(|video| {
            let metadata = TrackWriter::create(&spec.target.join(METADATA_TRACK_FILE))?;
            Ok((video, metadata))
        });
        let (video_track, metadata_track) = match tracks {
            Ok(tracks) => tracks,
            Err(e) => {
                let _ = fs::remove_dir_all(&spec.target);
                return Err(e.into());
            }
        };

        let (tx, rx) = mpsc::channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let encoded = Arc::new(AtomicU64::new(0));
        let failure = Arc::new(Mutex::new(None));

        let worker = EncodeWorker {
            side: spec.video.width,
            video_track,
            metadata_track,
            pending: pending.clone(),
            encoded: encoded.clone(),
            failure: failure.clone(),
        };
        let thread = std::thread::Builder::new()
            .name("bundle-writer".to_string())
            .spawn(move || worker.run(rx));
        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                let _ = fs::remove_dir_all(&spec.target);
                return Err(e.into());
            }
        };

        tracing::info!(
            "Opened bundle {:?} ({}x{} {}, queue depth {})",
            spec.target,
            spec.video.width,
            spec.video.height,
            spec.video.codec.fourcc().trim(),
            spec.queue_depth
        );

        Ok(Self {
            target: spec.target.clone(),
            video: spec.video.clone(),
            metadata: spec.metadata.clone(),
            queue_depth: spec.queue_depth.max(1),
            pending,
            encoded,
            failure,
            commands: Some(tx),
            thread: Some(thread),
        })
    }

    /// Frames encoded so far
    pub fn frames_encoded(&self) -> u64 {
        self.encoded.load(Ordering::Relaxed)
    }

    fn send(&self, command: WriterCommand) -> RecordingResult<()> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(RecordingError::WriteFailed(reason));
        }
        let commands = self.commands.as_ref().ok_or(RecordingError::NotRecording)?;
        commands
            .send(command)
            .map_err(|_| RecordingError::WriteFailed("bundle writer thread exited".to_string()))
    }
}

impl ContainerWriter for BundleWriter {
    fn is_ready_for_more_data(&self) -> bool {
        self.pending.load(Ordering::Acquire) < self.queue_depth
    }

    fn append_video(&mut self, frame: &PixelBuffer, time: MediaTime) -> RecordingResult<()> {
        if !frame.is_complete() || frame.width == 0 || frame.height == 0 {
            return Err(RecordingError::WriteFailed(format!(
                "Incomplete {}x{} frame ({} bytes)",
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }
        self.pending.fetch_add(1, Ordering::AcqRel);
        let result = self.send(WriterCommand::Video {
            frame: frame.clone(),
            time,
        });
        if result.is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        result
    }

    fn append_annotation(&mut self, annotation: FrameAnnotation) -> RecordingResult<()> {
        self.send(WriterCommand::Annotation(annotation))
    }

    fn finish(mut self: Box<Self>) -> RecordingResult<PathBuf> {
        // Closing the channel lets the worker drain and exit
        drop(self.commands.take());
        let thread = self.thread.take().ok_or(RecordingError::NotRecording)?;
        let counts = thread
            .join()
            .map_err(|_| {
                RecordingError::FinalizeFailed("bundle writer thread panicked".to_string())
            })?
            .map_err(|e| RecordingError::FinalizeFailed(e.to_string()))?;

        let duration = counts
            .last_time
            .map(|t| t + self.video.frame_duration)
            .unwrap_or(MediaTime::ZERO);

        let manifest = BundleManifest {
            version: BUNDLE_VERSION,
            created_at: Utc::now(),
            video: self.video.clone(),
            metadata: self.metadata.clone(),
            video_sample_count: counts.video,
            metadata_sample_count: counts.metadata,
            duration,
        };
        let content = serde_json::to_string_pretty(&manifest)
            .map_err(|e| RecordingError::FinalizeFailed(e.to_string()))?;
        fs::write(self.target.join(MANIFEST_FILE), content)?;

        tracing::info!(
            "Bundle finished: {} frames, {} annotations, output: {:?}",
            counts.video,
            counts.metadata,
            self.target
        );
        Ok(self.target.clone())
    }
}

impl Drop for BundleWriter {
    fn drop(&mut self) {
        drop(self.commands.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct EncodeWorker {
    side: u32,
    video_track: TrackWriter,
    metadata_track: TrackWriter,
    pending: Arc<AtomicUsize>,
    encoded: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<String>>>,
}

impl EncodeWorker {
    fn run(mut self, commands: mpsc::Receiver<WriterCommand>) -> Result<TrackCounts, BundleError> {
        for command in commands {
            let result = match command {
                WriterCommand::Video { frame, time } => {
                    let result = self.write_frame(&frame, time);
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                    result
                }
                WriterCommand::Annotation(annotation) => self
                    .metadata_track
                    .write_sample(annotation.presentation_time, &annotation.payload)
                    .map_err(BundleError::from),
            };

            if let Err(e) = result {
                tracing::error!("Bundle writer failed: {}", e);
                *self.failure.lock() = Some(e.to_string());
                return Err(e);
            }
        }

        let last_time = self.video_track.last_time();
        let video = self.video_track.finish()?;
        let metadata = self.metadata_track.finish()?;
        Ok(TrackCounts {
            video,
            metadata,
            last_time,
        })
    }

    fn write_frame(&mut self, frame: &PixelBuffer, time: MediaTime) -> Result<(), BundleError> {
        let rgba = fit_square(frame, self.side);
        let png = encode_png(&rgba, self.side)?;
        self.video_track.write_sample(time, &png)?;
        self.encoded.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Scale `frame` to fit a `side`×`side` canvas, centered on opaque black
fn fit_square(frame: &PixelBuffer, side: u32) -> Vec<u8> {
    let mut canvas = vec![0u8; side as usize * side as usize * 4];
    for px in canvas.chunks_exact_mut(4) {
        px[3] = 255;
    }

    let scale = (side as f64 / frame.width as f64).min(side as f64 / frame.height as f64);
    let out_w = ((frame.width as f64 * scale).round() as u32).clamp(1, side);
    let out_h = ((frame.height as f64 * scale).round() as u32).clamp(1, side);
    let x0 = (side - out_w) / 2;
    let y0 = (side - out_h) / 2;

    for y in 0..out_h {
        let src_y = (y as u64 * frame.height as u64 / out_h as u64) as u32;
        for x in 0..out_w {
            let src_x = (x as u64 * frame.width as u64 / out_w as u64) as u32;
            let offset = (((y0 + y) * side + x0 + x) * 4) as usize;
            canvas[offset..offset + 4].copy_from_slice(&frame.rgba_at(src_x, src_y));
        }
    }
    canvas
}

fn encode_png(rgba: &[u8], side: u32) -> Result<Vec<u8>, BundleError> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, side, side);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| BundleError::Png(format!("PNG header error: {}", e)))?;
    writer
        .write_image_data(rgba)
        .map_err(|e| BundleError::Png(format!("PNG encode error: {}", e)))?;
    writer
        .finish()
        .map_err(|e| BundleError::Png(format!("PNG finish error: {}", e)))?;
    Ok(out)
}

/// Decode a video sample back to RGBA
pub fn decode_frame(sample: &TrackSample) -> Result<DecodedFrame, BundleError> {
    let decoder = png::Decoder::new(sample.payload.as_slice());
    let mut reader = decoder
        .read_info()
        .map_err(|e| BundleError::Png(format!("PNG decode error: {}", e)))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| BundleError::Png(format!("PNG frame error: {}", e)))?;

    if info.color_type != png::ColorType::Rgba {
        return Err(BundleError::Png(format!("Unsupported PNG color type: {:?}", info.color_type)));
    }
    buf.truncate(info.buffer_size());

    Ok(DecodedFrame {
        width: info.width,
        height: info.height,
        data: buf,
    })
}

/// Read a finished bundle
pub fn read_bundle(bundle_path: &Path) -> Result<RecordedBundle, BundleError> {
    if !bundle_path.is_dir() {
        return Err(BundleError::InvalidBundle("Path is not a directory".to_string()));
    }

    let manifest_path = bundle_path.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(BundleError::MissingFile(MANIFEST_FILE.to_string()));
    }
    let manifest: BundleManifest = serde_json::from_str(&fs::read_to_string(&manifest_path)?)?;

    let video = read_required_track(bundle_path, VIDEO_TRACK_FILE)?;
    let metadata = read_required_track(bundle_path, METADATA_TRACK_FILE)?;

    if video.len() as u64 != manifest.video_sample_count
        || metadata.len() as u64 != manifest.metadata_sample_count
    {
        return Err(BundleError::InvalidBundle(format!(
            "Sample counts do not match manifest ({} video, {} metadata)",
            video.len(),
            metadata.len()
        )));
    }

    tracing::debug!("Loaded bundle {:?}: {} frames", bundle_path, video.len());

    Ok(RecordedBundle {
        manifest,
        video,
        metadata,
    })
}

fn read_required_track(bundle_path: &Path, name: &str) -> Result<Vec<TrackSample>, BundleError> {
    let path = bundle_path.join(name);
    if !path.exists() {
        return Err(BundleError::MissingFile(name.to_string()));
    }
    Ok(read_track(&path)?)
}

/// Check if a path is a finished bundle
pub fn is_valid_bundle(path: &Path) -> bool {
    path.is_dir() && path.join(MANIFEST_FILE).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::PixelFormat;
    use tempfile::tempdir;

    fn spec(target: PathBuf, queue_depth: usize) -> ContainerSpec {
        ContainerSpec {
            target,
            video: VideoTrackConfig {
                codec: VideoCodec::Png,
                width: 4,
                height: 4,
                frame_duration: MediaTime::frame_duration(30),
            },
            metadata: MetadataTrackConfig::default(),
            queue_depth,
        }
    }

    /// 4x2 BGRA frame, left half red, right half blue
    fn frame() -> PixelBuffer {
        let mut data: Vec<u8> = Vec::new();
        for _ in 0..2 {
            for x in 0..4 {
                if x < 2 {
                    data.extend_from_slice(&[0, 0, 255, 255]);
                } else {
                    data.extend_from_slice(&[255, 0, 0, 255]);
                }
            }
        }
        PixelBuffer::new(4, 2, PixelFormat::Bgra8, data)
    }

    fn annotation(time: MediaTime) -> FrameAnnotation {
        FrameAnnotation {
            presentation_time: time,
            payload: b"{}".to_vec(),
        }
    }

    #[test]
    fn test_write_and_read_bundle() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("capture.dcap");
        let mut writer: Box<dyn ContainerWriter> =
            Box::new(BundleWriter::create(&spec(target.clone(), 8)).unwrap());

        for i in 0..3 {
            let time = MediaTime::new(i, 30);
            writer.append_video(&frame(), time).unwrap();
            writer.append_annotation(annotation(time)).unwrap();
        }
        let output = writer.finish().unwrap();
        assert_eq!(output, target);
        assert!(is_valid_bundle(&output));

        let bundle = read_bundle(&output).unwrap();
        assert_eq!(bundle.manifest.video_sample_count, 3);
        assert_eq!(bundle.manifest.metadata_sample_count, 3);
        assert_eq!(bundle.manifest.duration, MediaTime::new(3, 30));
        assert_eq!(
            bundle.manifest.metadata.content_type,
            crate::annotation::ANNOTATION_CONTENT_TYPE
        );

        let times: Vec<MediaTime> = bundle.video.iter().map(|s| s.time).collect();
        let annotation_times: Vec<MediaTime> = bundle.metadata.iter().map(|s| s.time).collect();
        assert_eq!(times, annotation_times);
    }

    #[test]
    fn test_frames_are_letterboxed_into_square() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("capture.dcap");
        let mut writer: Box<dyn ContainerWriter> =
            Box::new(BundleWriter::create(&spec(target, 8)).unwrap());
        writer.append_video(&frame(), MediaTime::ZERO).unwrap();
        writer.append_annotation(annotation(MediaTime::ZERO)).unwrap();
        let bundle = read_bundle(&writer.finish().unwrap()).unwrap();

        let decoded = decode_frame(&bundle.video[0]).unwrap();
        assert_eq!((decoded.width, decoded.height), (4, 4));
        let px = |x: usize, y: usize| &decoded.data[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        // Rows 0 and 3 are padding
        assert_eq!(px(0, 0), &[0, 0, 0, 255]);
        assert_eq!(px(0, 1), &[255, 0, 0, 255]);
        assert_eq!(px(3, 2), &[0, 0, 255, 255]);
        assert_eq!(px(3, 3), &[0, 0, 0, 255]);
    }

    #[test]
    fn test_existing_target_is_refused() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("capture.dcap");
        fs::create_dir_all(&target).unwrap();
        assert!(BundleWriter::create(&spec(target, 8)).is_err());
    }

    #[test]
    fn test_incomplete_frame_is_rejected() {
        let dir = tempdir().unwrap();
        let mut writer = BundleWriter::create(&spec(dir.path().join("c.dcap"), 8)).unwrap();
        let short = PixelBuffer::new(4, 4, PixelFormat::Bgra8, vec![0u8; 10]);
        assert!(matches!(
            writer.append_video(&short, MediaTime::ZERO),
            Err(RecordingError::WriteFailed(_))
        ));
        assert!(writer.is_ready_for_more_data());
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unfinished.dcap");
        fs::create_dir_all(&path).unwrap();
        assert!(matches!(read_bundle(&path), Err(BundleError::MissingFile(_))));
        assert!(!is_valid_bundle(&path));
    }
}
