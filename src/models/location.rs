use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// One position fix as reported by the sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub coords: Coordinates,
    /// Accuracy radius in meters.
    pub accuracy: f64,
    /// Meters per second.
    pub speed: Option<f64>,
    /// Degrees clockwise from true north.
    pub heading: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed.map(|mps| mps * 3.6)
    }
}

/// A persisted row of `gps_logs`. Append-only.
#[derive(Debug, Clone, FromRow)]
pub struct TelemetryRecord {
    pub id: Uuid, // server-assigned
    pub worker_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub captured_at: DateTime<Utc>,
}
