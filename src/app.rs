//! Pipeline assembly
//!
//! Wires a recording session, frame distributor, synchronizer, delivery
//! worker and controls together from a [`CaptureConfig`].

use crate::capture::setup::SensorProfile;
use crate::capture::traits::DepthStreamControl;
use crate::config::CaptureConfig;
use crate::control::CaptureControls;
use crate::pipeline::{
    spawn_delivery_worker, DeliverySender, DeliveryWorker, FrameDistributor, StreamSynchronizer,
};
use crate::recorder::bundle::BundleContainerFactory;
use crate::recorder::container::ContainerFactory;
use crate::recorder::session::RecordingSession;
use crate::utils::error::AppResult;
use std::sync::Arc;

/// A running capture pipeline
pub struct CaptureApp {
    pub session: Arc<RecordingSession>,
    pub distributor: Arc<FrameDistributor>,
    pub controls: CaptureControls,
    pub deliveries: DeliverySender,
    pub worker: DeliveryWorker,
}

impl CaptureApp {
    /// Launch with the on-disk bundle container
    ///
    /// Must be called inside a tokio runtime.
    pub fn launch(
        config: &CaptureConfig,
        profile: &SensorProfile,
        depth: Arc<dyn DepthStreamControl>,
    ) -> AppResult<Self> {
        Self::launch_with(config, profile, depth, Arc::new(BundleContainerFactory))
    }

    /// Launch with a caller-provided container
    ///
    /// Installs the global subscriber with `config.log_filter` unless one is
    /// already set.
    pub fn launch_with(
        config: &CaptureConfig,
        profile: &SensorProfile,
        depth: Arc<dyn DepthStreamControl>,
        factory: Arc<dyn ContainerFactory>,
    ) -> AppResult<Self> {
        config.validate()?;
        crate::init_tracing(&config.log_filter);

        let mut session = RecordingSession::new(config.recording_config(profile), factory);
        if let Some(storage) = config.storage_sink() {
            session = session.with_storage(storage);
        }
        let session = Arc::new(session);
        let distributor = Arc::new(FrameDistributor::new());

        let controls = CaptureControls::new(session.clone(), depth);
        controls.set_filtering_enabled(config.filtering_enabled);

        let synchronizer = StreamSynchronizer::new(distributor.clone(), session.clone());
        let (deliveries, worker) = spawn_delivery_worker(synchronizer, config.delivery_queue_depth);

        tracing::info!(
            "Capture pipeline ready: {}x{} to {}px square @ {}fps",
            profile.color_width,
            profile.color_height,
            profile.preferred_width(),
            config.frame_rate
        );

        Ok(Self {
            session,
            distributor,
            controls,
            deliveries,
            worker,
        })
    }

    /// Stop any recording, drain the worker and wait for finalize
    pub async fn shutdown(self) -> AppResult<()> {
        let CaptureApp {
            session,
            deliveries,
            worker,
            ..
        } = self;

        drop(deliveries);
        worker.join().await;
        if let Some(handle) = session.stop() {
            tokio::task::spawn_blocking(move || handle.wait())
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        }
        Ok(())
    }
}
