//! Duty-shift lifecycle for one worker session.
//!
//! The backend is authoritative for whether a worker is on duty; the
//! controller's local state is a cache of the open shift, updated only after
//! the backend has accepted a change.

pub mod derive;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::{DutyState, ShiftRecord};
use crate::store::ShiftStore;
use chrono::{DateTime, TimeDelta, Utc};
use futures::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Interval;
use tracing::{info, warn};
use uuid::Uuid;

pub use derive::{derive_closing, duration_minutes, parse_odometer};

pub struct ShiftController {
    worker_id: Uuid,
    store: Arc<dyn ShiftStore>,
    clock: Arc<dyn Clock>,
    state: DutyState,
}

impl ShiftController {
    pub fn new(worker_id: Uuid, store: Arc<dyn ShiftStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            worker_id,
            store,
            clock,
            state: DutyState::OffDuty,
        }
    }

    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    pub fn state(&self) -> &DutyState {
        &self.state
    }

    pub fn current_shift(&self) -> Option<&ShiftRecord> {
        self.state.open_shift()
    }

    pub fn is_on_duty(&self) -> bool {
        matches!(self.state, DutyState::OnDuty(_))
    }

    /// Loads the worker's open shift from the backend, if any.
    pub async fn resume(&mut self) -> Result<&DutyState> {
        match self.store.find_open_shift(self.worker_id).await? {
            Some(record) => {
                info!(
                    "Resumed open shift {} for worker {} (started {})",
                    record.id, self.worker_id, record.start_time
                );
                self.state = DutyState::OnDuty(record);
            }
            None => {
                info!("No open shift for worker {}", self.worker_id);
                self.state = DutyState::OffDuty;
            }
        }
        Ok(&self.state)
    }

    /// Opens a shift. Local state changes only after the backend insert succeeds.
    pub async fn check_in(&mut self, start_odometer: i64) -> Result<ShiftRecord> {
        if self.is_on_duty() {
            return Err(Error::AlreadyOnDuty);
        }
        let start_odometer = derive::validate_start_odometer(start_odometer)?;

        if let Some(existing) = self.store.find_open_shift(self.worker_id).await? {
            warn!(
                "Check-in refused: shift {} is already open for worker {}",
                existing.id, self.worker_id
            );
            return Err(Error::ShiftAlreadyOpen);
        }

        let record = self
            .store
            .insert_shift(self.worker_id, self.clock.now(), start_odometer)
            .await?;
        info!(
            "Started shift {} for worker {} at odometer {}",
            record.id, self.worker_id, record.start_odometer
        );

        self.state = DutyState::OnDuty(record.clone());
        Ok(record)
    }

    /// Closes the open shift and returns the completed record.
    pub async fn check_out(&mut self, end_odometer: i64) -> Result<ShiftRecord> {
        let open = self.current_shift().ok_or(Error::NotOnDuty)?;
        let closing = derive_closing(open, self.clock.now(), end_odometer)?;

        self.store.close_shift(open.id, &closing).await?;
        let closed = open.closed_with(&closing);
        info!(
            "Ended shift {} for worker {}: {} km in {} min",
            closed.id, self.worker_id, closing.distance_km, closing.duration_minutes
        );

        self.state = DutyState::OffDuty;
        Ok(closed)
    }

    /// Time on duty so far; `None` while off duty.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.current_shift()
            .map(|record| (now - record.start_time).max(TimeDelta::zero()))
    }
}

/// Emits the elapsed time since `started_at` every `period`, for live display.
/// The first value is emitted immediately. `period` must be non-zero.
pub fn elapsed_ticks(
    started_at: DateTime<Utc>,
    period: Duration,
    clock: Arc<dyn Clock>,
) -> impl Stream<Item = TimeDelta> {
    stream::unfold(None::<Interval>, move |interval| {
        let clock = Arc::clone(&clock);
        async move {
            let mut interval = interval.unwrap_or_else(|| tokio::time::interval(period));
            interval.tick().await;
            let elapsed = (clock.now() - started_at).max(TimeDelta::zero());
            Some((elapsed, Some(interval)))
        }
    })
}

/// Renders an elapsed duration as `HH:MM:SS`; hours may exceed 24.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let total = elapsed.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
