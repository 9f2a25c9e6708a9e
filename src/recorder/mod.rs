//! Recording system module
//!
//! This module implements the recording side of the pipeline:
//! - RecordingSession state machine on a synthetic timeline
//! - ContainerFactory/ContainerWriter traits for output formats
//! - Bundle (on-disk) and memory containers
//! - StorageSink hand-off of finished outputs

pub mod bundle;
pub mod container;
pub mod memory;
pub mod session;
pub mod state;
pub mod storage;
pub mod track;

pub use bundle::{read_bundle, BundleContainerFactory, BundleError, BundleManifest, RecordedBundle};
pub use container::{
    ContainerFactory, ContainerSpec, ContainerWriter, RecordingError, RecordingResult,
};
pub use memory::MemoryContainerFactory;
pub use session::{FinalizeHandle, RecordingEvent, RecordingSession};
pub use state::{RecordingConfig, RecordingState, RecordingSummary};
pub use storage::{DirectoryStorageSink, StorageSink};
