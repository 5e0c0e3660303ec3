//! Backend collaborator seams.
//!
//! Components only talk to the backend through these traits; `db::PgStore`
//! and `db::listener::PgAlertSource` are the Postgres implementations.

use crate::error::Result;
use crate::models::{DriverProfile, EmergencyAlert, LocationSample, ShiftClosing, ShiftRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use uuid::Uuid;

#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Appends one position report and returns its server-assigned id.
    async fn insert_telemetry(&self, worker_id: Uuid, sample: &LocationSample) -> Result<Uuid>;
}

#[async_trait]
pub trait ShiftStore: Send + Sync {
    /// The most recent shift for `worker_id` with no end time, if any.
    async fn find_open_shift(&self, worker_id: Uuid) -> Result<Option<ShiftRecord>>;

    /// Opens a shift. Fails with `Error::ShiftAlreadyOpen` if the backend
    /// already holds an open shift for the worker.
    async fn insert_shift(
        &self,
        worker_id: Uuid,
        start_time: DateTime<Utc>,
        start_odometer: i64,
    ) -> Result<ShiftRecord>;

    /// Writes all closing fields in one update. Fails with `Error::NotOnDuty`
    /// if the shift is unknown or already closed.
    async fn close_shift(&self, shift_id: Uuid, closing: &ShiftClosing) -> Result<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn driver_profile(&self, worker_id: Uuid) -> Result<Option<DriverProfile>>;
}

/// Push stream of newly inserted alerts. Delivery is at-least-once.
pub type AlertStream = BoxStream<'static, Result<EmergencyAlert>>;

#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn subscribe(&self) -> Result<AlertStream>;
}
