//! Error types and handling
//!
//! Common error type used at the crate's outer edges.

use crate::capture::setup::SetupError;
use crate::config::ConfigError;
use crate::recorder::bundle::BundleError;
use crate::recorder::container::RecordingError;
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Stable code for logs and status reporting
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Setup(_) => "SETUP_ERROR",
            AppError::Recording(_) => "RECORDING_ERROR",
            AppError::Bundle(_) => "BUNDLE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
