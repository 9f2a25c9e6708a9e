//! Single-observer frame distribution

use crate::capture::frame::CapturedFramePair;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Receives every synchronized pair
///
/// Runs on the delivery worker and must return quickly.
pub trait FrameObserver: Send + Sync {
    fn on_pair(&self, pair: &CapturedFramePair);
}

/// Forwards pairs to at most one observer without owning it
#[derive(Default)]
pub struct FrameDistributor {
    observer: RwLock<Option<Weak<dyn FrameObserver>>>,
}

impl FrameDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registered observer
    pub fn register(&self, observer: &Arc<dyn FrameObserver>) {
        *self.observer.write() = Some(Arc::downgrade(observer));
    }

    pub fn unregister(&self) {
        self.observer.write().take();
    }

    /// Whether a live observer is registered
    pub fn has_observer(&self) -> bool {
        self.observer
            .read()
            .as_ref()
            .is_some_and(|observer| observer.strong_count() > 0)
    }

    /// Deliver `pair` to the observer, if any
    ///
    /// Returns whether an observer was invoked.
    pub fn on_pair(&self, pair: &CapturedFramePair) -> bool {
        let observer = self.observer.read().as_ref().and_then(Weak::upgrade);
        match observer {
            Some(observer) => {
                observer.on_pair(pair);
                true
            }
            None => false,
        }
    }
}
