//! Delivery path
//!
//! - StreamSynchronizer pairs dual deliveries and fans them out
//! - FrameDistributor hands each pair to a single non-owned observer
//! - the delivery worker runs the synchronizer on one dedicated task

pub mod distributor;
pub mod synchronizer;
pub mod worker;

pub use distributor::{FrameDistributor, FrameObserver};
pub use synchronizer::{build_pair, PairingSkip, StreamSynchronizer, SyncStats};
pub use worker::{spawn_delivery_worker, DeliverySender, DeliveryWorker};
