use depth_capture::capture::{
    CalibrationData, CapturedFramePair, ColorSample, DepthData, DepthFormat, DepthSample,
    DepthStreamControl, Dimensions, DropReason, DualDelivery, PixelBuffer, PixelFormat,
    SampleDelivery, SensorProfile,
};
use depth_capture::annotation::MetadataEncoder;
use depth_capture::pipeline::FrameObserver;
use depth_capture::recorder::bundle::{decode_frame, read_bundle};
use depth_capture::recorder::{RecordingEvent, RecordingState};
use depth_capture::{CaptureApp, CaptureConfig, MediaTime};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct DepthStream(AtomicBool);

impl DepthStreamControl for DepthStream {
    fn set_filtering_enabled(&self, enabled: bool) {
        self.0.store(enabled, Ordering::SeqCst);
    }

    fn is_filtering_enabled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Preview(Mutex<Vec<CapturedFramePair>>);

impl FrameObserver for Preview {
    fn on_pair(&self, pair: &CapturedFramePair) {
        self.0.lock().push(pair.clone());
    }
}

fn profile() -> SensorProfile {
    SensorProfile {
        device_id: "test".to_string(),
        color_width: 8,
        color_height: 6,
        pixel_format: PixelFormat::Bgra8,
        depth_width: 4,
        depth_height: 3,
        depth_format: DepthFormat::Depth32,
        frame_rate: 30,
    }
}

fn calibration() -> CalibrationData {
    CalibrationData {
        intrinsic_matrix: [[7.0, 0.0, 4.0], [0.0, 7.0, 3.0], [0.0, 0.0, 1.0]],
        reference_dimensions: Dimensions { width: 8, height: 6 },
        pixel_size_mm: 0.002,
        lens_distortion_center: [4.0, 3.0],
    }
}

fn color(ms: u64) -> ColorSample {
    ColorSample {
        buffer: PixelBuffer::new(8, 6, PixelFormat::Bgra8, vec![128u8; 8 * 6 * 4]),
        timestamp: Duration::from_millis(ms),
    }
}

fn depth(ms: u64) -> DepthSample {
    let values: Vec<f32> = (0..12).map(|i| 0.5 + i as f32 * 0.1).collect();
    DepthSample {
        depth: DepthData::new(4, 3, DepthFormat::Depth32, values).with_calibration(calibration()),
        timestamp: Duration::from_millis(ms),
    }
}

fn config(root: &std::path::Path) -> CaptureConfig {
    CaptureConfig {
        output_dir: root.join("out"),
        library_dir: Some(root.join("library")),
        delivery_queue_depth: 16,
        ..CaptureConfig::default()
    }
}

#[tokio::test]
async fn test_three_frames_are_recorded_on_synthetic_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let depth_stream = Arc::new(DepthStream::default());
    let app = CaptureApp::launch(&config(dir.path()), &profile(), depth_stream).unwrap();
    let mut events = app.session.subscribe();
    assert!(app.controls.filtering_enabled());

    let preview = Arc::new(Preview::default());
    let observer: Arc<dyn FrameObserver> = preview.clone();
    app.distributor.register(&observer);

    app.controls.set_recording(true).unwrap();
    assert_eq!(app.session.state(), RecordingState::Active);

    // Irregular capture timing; output timing is synthetic
    for ms in [0, 45, 61] {
        assert!(app.deliveries.deliver(DualDelivery::new(color(ms), depth(ms))).await);
    }

    let CaptureApp {
        session,
        controls,
        deliveries,
        worker,
        ..
    } = app;
    drop(deliveries);
    let synchronizer = worker.join().await.unwrap();
    assert_eq!(synchronizer.stats().recorded, 3);

    let handle = controls.set_recording(false).unwrap().unwrap();
    tokio::task::spawn_blocking(move || handle.wait()).await.unwrap();
    assert_eq!(session.state(), RecordingState::Idle);

    assert_eq!(preview.0.lock().len(), 3);

    let mut summary = None;
    while let Ok(event) = events.try_recv() {
        if let RecordingEvent::Finished(s) = event {
            summary = Some(s);
        }
    }
    let summary = summary.expect("finished event");
    assert_eq!(summary.frames_written, 3);
    assert_eq!(summary.frames_dropped, 0);

    let stored = dir.path().join("library").join(summary.output.file_name().unwrap());
    let bundle = read_bundle(&stored).unwrap();
    assert_eq!(bundle.video.len(), 3);
    assert_eq!(bundle.metadata.len(), 3);

    let frame_duration = MediaTime::frame_duration(30);
    for (i, (video, metadata)) in bundle.video.iter().zip(&bundle.metadata).enumerate() {
        assert_eq!(video.time, frame_duration.times(i as u64));
        assert_eq!(metadata.time, video.time);

        let annotation = MetadataEncoder::decode(&metadata.payload).unwrap();
        assert_eq!(annotation.calibration, Some(calibration()));
        assert_eq!(annotation.statistics.valid_count, 12);
    }

    let frame = decode_frame(&bundle.video[0]).unwrap();
    assert_eq!((frame.width, frame.height), (8, 8));
}

#[tokio::test]
async fn test_dropped_depth_reaches_neither_observer_nor_recording() {
    let dir = tempfile::tempdir().unwrap();
    let depth_stream = Arc::new(DepthStream::default());
    let app = CaptureApp::launch(&config(dir.path()), &profile(), depth_stream).unwrap();
    let mut events = app.session.subscribe();

    let preview = Arc::new(Preview::default());
    let observer: Arc<dyn FrameObserver> = preview.clone();
    app.distributor.register(&observer);

    app.controls.set_recording(true).unwrap();
    let dropped = DualDelivery {
        color: Some(SampleDelivery::Captured(color(0))),
        depth: Some(SampleDelivery::Dropped(DropReason::LateData)),
    };
    assert!(app.deliveries.deliver(dropped).await);

    let CaptureApp {
        session,
        controls,
        deliveries,
        worker,
        ..
    } = app;
    drop(deliveries);
    let synchronizer = worker.join().await.unwrap();
    assert_eq!(synchronizer.stats().depth_dropped, 1);

    let handle = controls.set_recording(false).unwrap().unwrap();
    tokio::task::spawn_blocking(move || handle.wait()).await.unwrap();
    assert_eq!(session.state(), RecordingState::Idle);

    assert!(preview.0.lock().is_empty());

    let mut written = None;
    while let Ok(event) = events.try_recv() {
        if let RecordingEvent::Finished(s) = event {
            written = Some(s.frames_written);
        }
    }
    assert_eq!(written, Some(0));
}
