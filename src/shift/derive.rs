//! Pure odometer validation and closing-field derivation.

use crate::error::ValidationError;
use crate::models::{ShiftClosing, ShiftRecord};
use chrono::{DateTime, Utc};

/// Parses a typed odometer reading. Only whole numbers are accepted.
pub fn parse_odometer(input: &str) -> Result<i64, ValidationError> {
    let trimmed = input.trim();
    trimmed
        .parse::<i64>()
        .map_err(|_| ValidationError::OdometerNotNumeric(trimmed.to_string()))
}

pub fn validate_start_odometer(start_odometer: i64) -> Result<i64, ValidationError> {
    if start_odometer <= 0 {
        return Err(ValidationError::OdometerNotPositive(start_odometer));
    }
    Ok(start_odometer)
}

pub fn validate_end_odometer(start_odometer: i64, end_odometer: i64) -> Result<i64, ValidationError> {
    if end_odometer <= start_odometer {
        return Err(ValidationError::EndOdometerTooLow {
            must_exceed: start_odometer,
            got: end_odometer,
        });
    }
    Ok(end_odometer)
}

/// Whole minutes between `start` and `end`, rounded down. Clock skew that puts
/// `end` before `start` yields zero.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().div_euclid(60).max(0)
}

pub fn derive_closing(
    open: &ShiftRecord,
    end_time: DateTime<Utc>,
    end_odometer: i64,
) -> Result<ShiftClosing, ValidationError> {
    let end_odometer = validate_end_odometer(open.start_odometer, end_odometer)?;
    Ok(ShiftClosing {
        end_time,
        end_odometer,
        distance_km: end_odometer - open.start_odometer,
        duration_minutes: duration_minutes(open.start_time, end_time),
    })
}
