//! Capture configuration
//!
//! Loaded from a JSON file; every field has a default so partial files work.

use crate::capture::setup::SensorProfile;
use crate::recorder::state::RecordingConfig;
use crate::recorder::storage::{DirectoryStorageSink, StorageSink};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Where recordings are written while in progress
    pub output_dir: PathBuf,

    /// Where finished recordings are moved; kept in place when unset
    pub library_dir: Option<PathBuf>,

    /// Nominal output frame rate
    pub frame_rate: u32,

    /// Frames the container may buffer before reporting backpressure
    pub writer_queue_depth: usize,

    /// Deliveries that may wait for the delivery worker
    pub delivery_queue_depth: usize,

    /// Initial depth filtering setting
    pub filtering_enabled: bool,

    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("depth-capture"),
            library_dir: None,
            frame_rate: 30,
            writer_queue_depth: 8,
            delivery_queue_depth: 4,
            filtering_enabled: true,
            log_filter: "depth_capture=debug".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: CaptureConfig = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded capture config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 || self.frame_rate > 240 {
            return Err(ConfigError::Invalid(format!("frameRate {} out of range", self.frame_rate)));
        }
        if self.writer_queue_depth == 0 {
            return Err(ConfigError::Invalid("writerQueueDepth must be at least 1".to_string()));
        }
        if self.delivery_queue_depth == 0 {
            return Err(ConfigError::Invalid("deliveryQueueDepth must be at least 1".to_string()));
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.log_filter) {
            return Err(ConfigError::Invalid(format!("logFilter {:?}: {}", self.log_filter, e)));
        }
        Ok(())
    }

    /// Recording settings for a sensor
    pub fn recording_config(&self, profile: &SensorProfile) -> RecordingConfig {
        RecordingConfig {
            frame_rate: self.frame_rate,
            writer_queue_depth: self.writer_queue_depth,
            ..RecordingConfig::for_profile(&self.output_dir, profile)
        }
    }

    pub fn storage_sink(&self) -> Option<Arc<dyn StorageSink>> {
        self.library_dir
            .as_ref()
            .map(|dir| Arc::new(DirectoryStorageSink::new(dir)) as Arc<dyn StorageSink>)
    }
}
