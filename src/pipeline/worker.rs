//! Delivery worker
//!
//! A single task owns the synchronizer and drains deliveries in arrival order,
//! so no two deliveries are ever processed concurrently.

use super::synchronizer::{StreamSynchronizer, SyncStats};
use crate::capture::frame::DualDelivery;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Hardware-side handle for pushing deliveries
#[derive(Clone)]
pub struct DeliverySender {
    tx: mpsc::Sender<DualDelivery>,
    overflow: Arc<AtomicU64>,
}

impl DeliverySender {
    /// Queue a delivery without waiting
    ///
    /// When the worker is behind the delivery is discarded, as the hardware
    /// would discard a late sample. Returns whether it was queued.
    pub fn try_deliver(&self, delivery: DualDelivery) -> bool {
        match self.tx.try_send(delivery) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Delivery worker behind, discarding delivery");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Queue a delivery, waiting for room
    pub async fn deliver(&self, delivery: DualDelivery) -> bool {
        self.tx.send(delivery).await.is_ok()
    }

    /// Deliveries discarded because the queue was full
    pub fn overflow_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }
}

/// Handle to the running worker
pub struct DeliveryWorker {
    handle: JoinHandle<StreamSynchronizer>,
}

impl DeliveryWorker {
    /// Wait for the worker to exit (after every sender is dropped) and get the
    /// synchronizer back
    pub async fn join(self) -> Option<StreamSynchronizer> {
        match self.handle.await {
            Ok(synchronizer) => Some(synchronizer),
            Err(e) => {
                tracing::error!("Delivery worker failed: {}", e);
                None
            }
        }
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Start the worker on the current tokio runtime
pub fn spawn_delivery_worker(
    mut synchronizer: StreamSynchronizer,
    capacity: usize,
) -> (DeliverySender, DeliveryWorker) {
    let (tx, mut rx) = mpsc::channel::<DualDelivery>(capacity.max(1));

    let handle = tokio::spawn(async move {
        tracing::info!("Delivery worker started");
        while let Some(delivery) = rx.recv().await {
            synchronizer.on_dual_delivery(delivery);
        }
        log_stats(&synchronizer.stats());
        synchronizer
    });

    let sender = DeliverySender {
        tx,
        overflow: Arc::new(AtomicU64::new(0)),
    };
    (sender, DeliveryWorker { handle })
}

fn log_stats(stats: &SyncStats) {
    tracing::info!(
        "Delivery worker stopped: {} deliveries, {} pairs, {} recorded, {} skipped",
        stats.deliveries,
        stats.pairs,
        stats.recorded,
        stats.skipped()
    );
}
