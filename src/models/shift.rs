use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// A row of `work_days`. Opened on check-in, closed exactly once on check-out.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ShiftRecord {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub start_odometer: i64,
    pub end_time: Option<DateTime<Utc>>,
    pub end_odometer: Option<i64>,
    pub distance_km: Option<i64>,
    pub duration_minutes: Option<i64>,
}

impl ShiftRecord {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Returns a copy with the closing fields filled in.
    pub fn closed_with(&self, closing: &ShiftClosing) -> ShiftRecord {
        ShiftRecord {
            end_time: Some(closing.end_time),
            end_odometer: Some(closing.end_odometer),
            distance_km: Some(closing.distance_km),
            duration_minutes: Some(closing.duration_minutes),
            ..self.clone()
        }
    }
}

/// The four fields written when a shift is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftClosing {
    pub end_time: DateTime<Utc>,
    pub end_odometer: i64,
    pub distance_km: i64,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DutyState {
    #[default]
    OffDuty,
    OnDuty(ShiftRecord),
}

impl DutyState {
    pub fn open_shift(&self) -> Option<&ShiftRecord> {
        match self {
            DutyState::OnDuty(record) => Some(record),
            DutyState::OffDuty => None,
        }
    }
}
