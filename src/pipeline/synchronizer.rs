//! Dual-delivery pairing
//!
//! Turns synchronized hardware deliveries into [`CapturedFramePair`]s and fans
//! them out: to the recording session while it is Active, then to the frame
//! distributor. Deliveries that cannot form a pair are skipped silently.

use super::distributor::FrameDistributor;
use crate::capture::frame::{CapturedFramePair, DualDelivery, SampleDelivery};
use crate::recorder::RecordingSession;
use std::sync::Arc;

/// Why a delivery did not produce a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingSkip {
    ColorMissing,
    DepthMissing,
    ColorDropped,
    DepthDropped,
    MissingCalibration,
}

/// Pairing counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub deliveries: u64,
    pub pairs: u64,
    /// Pairs the recording session actually wrote
    pub recorded: u64,
    pub color_missing: u64,
    pub depth_missing: u64,
    pub color_dropped: u64,
    pub depth_dropped: u64,
    pub missing_calibration: u64,
}

impl SyncStats {
    fn count_skip(&mut self, skip: PairingSkip) {
        let counter = match skip {
            PairingSkip::ColorMissing => &mut self.color_missing,
            PairingSkip::DepthMissing => &mut self.depth_missing,
            PairingSkip::ColorDropped => &mut self.color_dropped,
            PairingSkip::DepthDropped => &mut self.depth_dropped,
            PairingSkip::MissingCalibration => &mut self.missing_calibration,
        };
        *counter += 1;
    }

    pub fn skipped(&self) -> u64 {
        self.deliveries - self.pairs
    }
}

/// Pairs dual deliveries and dispatches the result
///
/// Deliveries are handled one at a time through `&mut self`.
pub struct StreamSynchronizer {
    distributor: Arc<FrameDistributor>,
    recorder: Arc<RecordingSession>,
    stats: SyncStats,
}

impl StreamSynchronizer {
    pub fn new(distributor: Arc<FrameDistributor>, recorder: Arc<RecordingSession>) -> Self {
        Self {
            distributor,
            recorder,
            stats: SyncStats::default(),
        }
    }

    pub fn distributor(&self) -> &Arc<FrameDistributor> {
        &self.distributor
    }

    pub fn recorder(&self) -> &Arc<RecordingSession> {
        &self.recorder
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Handle one dual delivery
    pub fn on_dual_delivery(&mut self, delivery: DualDelivery) -> Option<CapturedFramePair> {
        self.stats.deliveries += 1;

        let pair = match build_pair(delivery) {
            Ok(pair) => pair,
            Err(skip) => {
                self.stats.count_skip(skip);
                tracing::trace!("Skipping delivery: {:?}", skip);
                return None;
            }
        };
        self.stats.pairs += 1;

        if self.recorder.is_active() && self.recorder.append_frame(&pair.color, &pair.depth) {
            self.stats.recorded += 1;
        }
        self.distributor.on_pair(&pair);

        Some(pair)
    }
}

/// Validate both sides and assemble a pair
pub fn build_pair(delivery: DualDelivery) -> Result<CapturedFramePair, PairingSkip> {
    let color = match delivery.color {
        None => return Err(PairingSkip::ColorMissing),
        Some(SampleDelivery::Dropped(_)) => return Err(PairingSkip::ColorDropped),
        Some(SampleDelivery::Captured(color)) => color,
    };
    let depth = match delivery.depth {
        None => return Err(PairingSkip::DepthMissing),
        Some(SampleDelivery::Dropped(_)) => return Err(PairingSkip::DepthDropped),
        Some(SampleDelivery::Captured(depth)) => depth,
    };
    let calibration = depth.depth.calibration.clone().ok_or(PairingSkip::MissingCalibration)?;

    Ok(CapturedFramePair {
        color: color.buffer,
        depth: depth.depth,
        intrinsic_matrix: calibration.intrinsic_matrix,
        reference_dimensions: calibration.reference_dimensions,
        capture_instant: color.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{
        CalibrationData, ColorSample, DepthData, DepthFormat, DepthSample, Dimensions, DropReason,
        PixelBuffer, PixelFormat,
    };
    use crate::pipeline::distributor::FrameObserver;
    use crate::recorder::memory::MemoryContainerFactory;
    use crate::recorder::RecordingConfig;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Collector(Mutex<Vec<CapturedFramePair>>);

    impl FrameObserver for Collector {
        fn on_pair(&self, pair: &CapturedFramePair) {
            self.0.lock().push(pair.clone());
        }
    }

    fn calibration() -> CalibrationData {
        CalibrationData {
            intrinsic_matrix: [[600.0, 0.0, 320.0], [0.0, 600.0, 240.0], [0.0, 0.0, 1.0]],
            reference_dimensions: Dimensions { width: 640, height: 480 },
            pixel_size_mm: 0.0015,
            lens_distortion_center: [321.0, 239.0],
        }
    }

    fn color(ms: u64) -> SampleDelivery<ColorSample> {
        SampleDelivery::Captured(ColorSample {
            buffer: PixelBuffer::new(2, 2, PixelFormat::Bgra8, vec![0u8; 16]),
            timestamp: Duration::from_millis(ms),
        })
    }

    fn depth(calibrated: bool) -> SampleDelivery<DepthSample> {
        let mut data = DepthData::new(1, 1, DepthFormat::Depth32, vec![1.25]);
        if calibrated {
            data = data.with_calibration(calibration());
        }
        SampleDelivery::Captured(DepthSample {
            depth: data,
            timestamp: Duration::ZERO,
        })
    }

    struct Fixture {
        synchronizer: StreamSynchronizer,
        collector: Arc<Collector>,
        factory: Arc<MemoryContainerFactory>,
        _observer: Arc<dyn FrameObserver>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryContainerFactory::new())
    }

    fn fixture_with(factory: MemoryContainerFactory) -> Fixture {
        let dir = tempdir().unwrap();
        let factory = Arc::new(factory);
        let config = RecordingConfig {
            output_dir: dir.path().to_path_buf(),
            video_size: 2,
            frame_rate: 30,
            writer_queue_depth: 4,
        };
        let session = Arc::new(RecordingSession::new(config, factory.clone()));
        let distributor = Arc::new(FrameDistributor::new());
        let collector = Arc::new(Collector::default());
        let observer: Arc<dyn FrameObserver> = collector.clone();
        distributor.register(&observer);

        Fixture {
            synchronizer: StreamSynchronizer::new(distributor, session),
            collector,
            factory,
            _observer: observer,
            _dir: dir,
        }
    }

    #[test]
    fn test_valid_delivery_produces_one_pair() {
        let mut fx = fixture();
        let pair = fx
            .synchronizer
            .on_dual_delivery(DualDelivery {
                color: Some(color(40)),
                depth: Some(depth(true)),
            })
            .unwrap();

        assert_eq!(pair.intrinsic_matrix, calibration().intrinsic_matrix);
        assert_eq!(pair.reference_dimensions, calibration().reference_dimensions);
        assert_eq!(pair.capture_instant, Duration::from_millis(40));
        assert_eq!(fx.collector.0.lock().len(), 1);
        assert_eq!(fx.synchronizer.stats().pairs, 1);
    }

    #[test]
    fn test_dropped_sides_produce_nothing() {
        let mut fx = fixture();
        fx.synchronizer.recorder().start().unwrap();

        let deliveries = vec![
            DualDelivery {
                color: Some(SampleDelivery::Dropped(DropReason::LateData)),
                depth: Some(depth(true)),
            },
            DualDelivery {
                color: Some(color(0)),
                depth: Some(SampleDelivery::Dropped(DropReason::OutOfBuffers)),
            },
            DualDelivery {
                color: Some(SampleDelivery::Dropped(DropReason::Discontinuity)),
                depth: Some(SampleDelivery::Dropped(DropReason::Discontinuity)),
            },
            DualDelivery {
                color: None,
                depth: Some(depth(true)),
            },
            DualDelivery {
                color: Some(color(0)),
                depth: None,
            },
        ];
        for delivery in deliveries {
            assert!(fx.synchronizer.on_dual_delivery(delivery).is_none());
        }

        fx.synchronizer.recorder().stop().unwrap().wait();
        assert!(fx.collector.0.lock().is_empty());
        assert!(fx.factory.recordings()[0].frame_times.is_empty());

        let stats = fx.synchronizer.stats();
        assert_eq!(stats.deliveries, 5);
        assert_eq!(stats.skipped(), 5);
        assert_eq!(stats.color_dropped, 2);
        assert_eq!(stats.depth_dropped, 1);
        assert_eq!(stats.recorded, 0);
    }

    #[test]
    fn test_missing_calibration_produces_nothing() {
        let mut fx = fixture();
        let result = fx.synchronizer.on_dual_delivery(DualDelivery {
            color: Some(color(0)),
            depth: Some(depth(false)),
        });
        assert!(result.is_none());
        assert!(fx.collector.0.lock().is_empty());
        assert_eq!(fx.synchronizer.stats().missing_calibration, 1);
    }

    #[test]
    fn test_pairs_reach_recorder_only_while_active() {
        let mut fx = fixture();
        let delivery = || DualDelivery {
            color: Some(color(0)),
            depth: Some(depth(true)),
        };

        fx.synchronizer.on_dual_delivery(delivery());
        fx.synchronizer.recorder().start().unwrap();
        fx.synchronizer.on_dual_delivery(delivery());
        fx.synchronizer.on_dual_delivery(delivery());
        fx.synchronizer.recorder().stop().unwrap().wait();
        fx.synchronizer.on_dual_delivery(delivery());

        assert_eq!(fx.collector.0.lock().len(), 4);
        assert_eq!(fx.factory.recordings()[0].frame_times.len(), 2);
        assert_eq!(fx.synchronizer.stats().recorded, 2);
    }

    #[test]
    fn test_recording_proceeds_without_observer() {
        let mut fx = fixture();
        fx.synchronizer.distributor().unregister();
        fx.synchronizer.recorder().start().unwrap();

        let pair = fx.synchronizer.on_dual_delivery(DualDelivery {
            color: Some(color(0)),
            depth: Some(depth(true)),
        });
        assert!(pair.is_some());

        fx.synchronizer.recorder().stop().unwrap().wait();
        assert_eq!(fx.factory.recordings()[0].annotations.len(), 1);
    }

    #[test]
    fn test_frames_dropped_by_recorder_are_not_counted() {
        let factory = MemoryContainerFactory::with_readiness(|attempt| attempt % 2 == 0);
        let mut fx = fixture_with(factory);
        fx.synchronizer.recorder().start().unwrap();

        for ms in 0..4 {
            fx.synchronizer.on_dual_delivery(DualDelivery {
                color: Some(color(ms)),
                depth: Some(depth(true)),
            });
        }
        fx.synchronizer.recorder().stop().unwrap().wait();

        let stats = fx.synchronizer.stats();
        assert_eq!(stats.pairs, 4);
        assert_eq!(stats.recorded, 2);
        assert_eq!(fx.factory.recordings()[0].frame_times.len(), 2);
        assert_eq!(fx.collector.0.lock().len(), 4);
    }
}
