pub const INSERT_GPS_LOG: &str = r#"
INSERT INTO gps_logs (worker_id, latitude, longitude, accuracy, speed, heading, captured_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)
RETURNING id;
"#;

pub const SELECT_OPEN_WORK_DAY: &str = r#"
SELECT id, worker_id, start_time, start_odometer, end_time, end_odometer, distance_km, duration_minutes
FROM work_days
WHERE worker_id = $1 AND end_time IS NULL
ORDER BY start_time DESC
LIMIT 1;
"#;

// Backed by the partial unique index one_open_work_day_per_worker: a second
// open shift for the same worker inserts nothing and returns no row.
pub const INSERT_WORK_DAY: &str = r#"
INSERT INTO work_days (worker_id, start_time, start_odometer)
VALUES ($1, $2, $3)
ON CONFLICT (worker_id) WHERE end_time IS NULL DO NOTHING
RETURNING id, worker_id, start_time, start_odometer, end_time, end_odometer, distance_km, duration_minutes;
"#;

pub const UPDATE_WORK_DAY_END: &str = r#"
UPDATE work_days
SET end_time = $2,
    end_odometer = $3,
    distance_km = $4,
    duration_minutes = $5
WHERE id = $1 AND end_time IS NULL;
"#;

pub const SELECT_DRIVER_PROFILE: &str = r#"
SELECT id, display_name FROM driver_profiles WHERE id = $1;
"#;
