//! Capture controls
//!
//! Property-style surface for UIs: `filtering_enabled` is applied to the live
//! depth stream immediately, `recording` is edge-triggered onto the session's
//! start/stop.

use crate::capture::traits::DepthStreamControl;
use crate::recorder::container::RecordingResult;
use crate::recorder::session::{FinalizeHandle, RecordingSession};
use crate::recorder::state::RecordingState;
use std::sync::Arc;

pub struct CaptureControls {
    session: Arc<RecordingSession>,
    depth: Arc<dyn DepthStreamControl>,
}

impl CaptureControls {
    pub fn new(session: Arc<RecordingSession>, depth: Arc<dyn DepthStreamControl>) -> Self {
        Self { session, depth }
    }

    pub fn filtering_enabled(&self) -> bool {
        self.depth.is_filtering_enabled()
    }

    pub fn set_filtering_enabled(&self, enabled: bool) {
        tracing::debug!("Depth filtering {}", if enabled { "enabled" } else { "disabled" });
        self.depth.set_filtering_enabled(enabled);
    }

    /// Read from the session, so stops made elsewhere are reflected
    pub fn recording(&self) -> bool {
        matches!(
            self.session.state(),
            RecordingState::Starting | RecordingState::Active
        )
    }

    /// Set the recording flag
    ///
    /// false→true starts the session, true→false stops it. Setting the
    /// current value does nothing.
    pub fn set_recording(&self, recording: bool) -> RecordingResult<Option<FinalizeHandle>> {
        if self.recording() == recording {
            return Ok(None);
        }

        if recording {
            self.session.start()?;
            Ok(None)
        } else {
            Ok(self.session.stop())
        }
    }
}
