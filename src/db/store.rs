use crate::db::{queries, DbPool};
use crate::error::{Error, Result};
use crate::models::{DriverProfile, LocationSample, ShiftClosing, ShiftRecord};
use crate::store::{ProfileStore, ShiftStore, TelemetryStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{debug, warn};
use uuid::Uuid;

/// Postgres-backed telemetry, shift, and profile store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl TelemetryStore for PgStore {
    async fn insert_telemetry(&self, worker_id: Uuid, sample: &LocationSample) -> Result<Uuid> {
        let row = sqlx::query(queries::INSERT_GPS_LOG)
            .bind(worker_id)
            .bind(sample.coords.lat)
            .bind(sample.coords.lon)
            .bind(sample.accuracy)
            .bind(sample.speed)
            .bind(sample.heading)
            .bind(sample.captured_at)
            .fetch_one(&self.pool)
            .await?;
        let id: Uuid = row.try_get("id")?;
        Ok(id)
    }
}

#[async_trait]
impl ShiftStore for PgStore {
    async fn find_open_shift(&self, worker_id: Uuid) -> Result<Option<ShiftRecord>> {
        let record = sqlx::query_as::<_, ShiftRecord>(queries::SELECT_OPEN_WORK_DAY)
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn insert_shift(
        &self,
        worker_id: Uuid,
        start_time: DateTime<Utc>,
        start_odometer: i64,
    ) -> Result<ShiftRecord> {
        let inserted = sqlx::query_as::<_, ShiftRecord>(queries::INSERT_WORK_DAY)
            .bind(worker_id)
            .bind(start_time)
            .bind(start_odometer)
            .fetch_optional(&self.pool)
            .await?;

        match inserted {
            Some(record) => {
                debug!("Inserted work day {} for worker {}", record.id, worker_id);
                Ok(record)
            }
            None => {
                warn!("Rejected second open work day for worker {}", worker_id);
                Err(Error::ShiftAlreadyOpen)
            }
        }
    }

    async fn close_shift(&self, shift_id: Uuid, closing: &ShiftClosing) -> Result<()> {
        let result = sqlx::query(queries::UPDATE_WORK_DAY_END)
            .bind(shift_id)
            .bind(closing.end_time)
            .bind(closing.end_odometer)
            .bind(closing.distance_km)
            .bind(closing.duration_minutes)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!("Work day {} was not open when closing", shift_id);
            return Err(Error::NotOnDuty);
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn driver_profile(&self, worker_id: Uuid) -> Result<Option<DriverProfile>> {
        let profile = sqlx::query_as::<_, DriverProfile>(queries::SELECT_DRIVER_PROFILE)
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }
}
