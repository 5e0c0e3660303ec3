//! Throttled telemetry upload.
//!
//! Samples closer than the minimum interval to the last successful upload are
//! dropped. A failed upload leaves the throttle untouched so the very next
//! sample is tried again.

use crate::clock::Clock;
use crate::models::LocationSample;
use crate::store::TelemetryStore;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

pub const MIN_UPLOAD_INTERVAL: Duration = Duration::from_secs(30);

/// Samples a spawned uplink holds while an upload is in flight; extras are dropped.
pub const UPLINK_BUFFER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    min_interval: TimeDelta,
    last_upload: DateTime<Utc>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval: TimeDelta::from_std(min_interval).unwrap_or(TimeDelta::MAX),
            last_upload: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn admits(&self, now: DateTime<Utc>) -> bool {
        now - self.last_upload >= self.min_interval
    }

    pub fn record_upload(&mut self, at: DateTime<Utc>) {
        self.last_upload = at;
    }

    pub fn last_upload(&self) -> DateTime<Utc> {
        self.last_upload
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Throttled,
    Uploaded(Uuid),
    Failed,
}

pub struct TelemetryUplink {
    worker_id: Uuid,
    store: Arc<dyn TelemetryStore>,
    clock: Arc<dyn Clock>,
    throttle: Throttle,
}

impl TelemetryUplink {
    pub fn new(
        worker_id: Uuid,
        store: Arc<dyn TelemetryStore>,
        clock: Arc<dyn Clock>,
        min_interval: Duration,
    ) -> Self {
        Self {
            worker_id,
            store,
            clock,
            throttle: Throttle::new(min_interval),
        }
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Applies the throttle to one sample and uploads it if admitted.
    /// Failures are logged and never returned.
    pub async fn offer(&mut self, sample: &LocationSample) -> UploadOutcome {
        let now = self.clock.now();
        if !self.throttle.admits(now) {
            debug!(worker_id = %self.worker_id, "sample throttled");
            return UploadOutcome::Throttled;
        }

        match self.store.insert_telemetry(self.worker_id, sample).await {
            Ok(id) => {
                self.throttle.record_upload(now);
                debug!(worker_id = %self.worker_id, record_id = %id, "telemetry uploaded");
                UploadOutcome::Uploaded(id)
            }
            Err(e) => {
                warn!(worker_id = %self.worker_id, "Failed to upload telemetry: {}", e);
                UploadOutcome::Failed
            }
        }
    }

    /// Moves the uplink onto its own task. Samples are handed over without waiting.
    pub fn spawn(mut self) -> UplinkHandle {
        let (tx, mut rx) = mpsc::channel::<LocationSample>(UPLINK_BUFFER);
        let task = tokio::spawn(async move {
            while let Some(sample) = rx.recv().await {
                self.offer(&sample).await;
            }
            debug!(worker_id = %self.worker_id, "telemetry uplink drained");
        });
        UplinkHandle {
            sender: UplinkSender { tx },
            task,
        }
    }
}

/// Cloneable sending side of a spawned uplink.
#[derive(Clone)]
pub struct UplinkSender {
    tx: mpsc::Sender<LocationSample>,
}

impl UplinkSender {
    /// Never blocks; drops the sample if the uplink is still busy.
    pub fn submit(&self, sample: LocationSample) {
        match self.tx.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("uplink busy, sample dropped"),
            Err(TrySendError::Closed(_)) => error!("telemetry uplink has stopped"),
        }
    }
}

/// Owner of a spawned uplink. The task exits once every sender is dropped;
/// dropping the handle does not cancel an upload in flight.
pub struct UplinkHandle {
    sender: UplinkSender,
    task: JoinHandle<()>,
}

impl UplinkHandle {
    pub fn sender(&self) -> UplinkSender {
        self.sender.clone()
    }

    pub fn submit(&self, sample: LocationSample) {
        self.sender.submit(sample);
    }

    /// Waits for queued uploads to finish. Other senders must be dropped first.
    pub async fn close(self) {
        drop(self.sender);
        if let Err(e) = self.task.await {
            error!("telemetry uplink task failed: {}", e);
        }
    }
}
