//! Error types for duty-tracker.

use thiserror::Error;

/// Transient faults reported by the position sensor. The subscription stays
/// open after any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorFault {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position request timed out")]
    Timeout,

    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
}

/// Rejected odometer input. Never reaches the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("odometer reading {0:?} is not a whole number")]
    OdometerNotNumeric(String),

    #[error("odometer reading must be positive, got {0}")]
    OdometerNotPositive(i64),

    #[error("end odometer must be greater than {must_exceed}, got {got}")]
    EndOdometerTooLow { must_exceed: i64, got: i64 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("positioning is not supported on this device")]
    SensorUnavailable,

    #[error("sensor error: {0}")]
    Sensor(#[from] SensorFault),

    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("alert stream error: {0}")]
    Stream(String),

    #[error("worker is already on duty")]
    AlreadyOnDuty,

    #[error("worker is not on duty")]
    NotOnDuty,

    #[error("an open shift already exists for this worker")]
    ShiftAlreadyOpen,

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the same call may succeed if repeated unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Persistence(_) | Error::Stream(_) | Error::Sensor(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
