//! depth-capture - synchronized color + depth capture with annotated recording.
//!
//! Pairs color and depth deliveries from a depth camera, hands every pair to a
//! live observer, and on demand records the color stream plus a per-frame depth
//! annotation track on a gap-free synthetic timeline.

pub mod annotation;
pub mod app;
pub mod capture;
pub mod config;
pub mod control;
pub mod media_time;
pub mod pipeline;
pub mod recorder;
pub mod utils;

pub use app::CaptureApp;
pub use config::CaptureConfig;
pub use media_time::MediaTime;
pub use utils::error::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
///
/// `RUST_LOG` wins over `default_filter`. Safe to call more than once; only
/// the first call installs a subscriber.
pub fn init_tracing(default_filter: &str) {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting depth-capture v{}", env!("CARGO_PKG_VERSION"));
    }
}
