#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use duty_tracker::alerts::AttentionCue;
use duty_tracker::clock::Clock;
use duty_tracker::error::{Error, Result};
use duty_tracker::models::{
    Coordinates, DriverProfile, EmergencyAlert, LocationSample, Severity, ShiftClosing, ShiftRecord,
};
use duty_tracker::sensor::{PositionSource, SamplerOptions, SensorEvent, WatchId};
use duty_tracker::store::{AlertSource, AlertStream, ProfileStore, ShiftStore, TelemetryStore};
use futures::stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap()
}

pub fn sample_at(captured_at: DateTime<Utc>) -> LocationSample {
    LocationSample {
        coords: Coordinates {
            lat: -22.9068,
            lon: -43.1729,
        },
        accuracy: 6.0,
        speed: Some(11.0),
        heading: Some(270.0),
        captured_at,
    }
}

pub fn alert(title: &str, severity: Severity) -> EmergencyAlert {
    EmergencyAlert {
        id: Uuid::new_v4(),
        title: title.to_string(),
        message: format!("{title}: follow operator instructions"),
        severity,
        active: true,
    }
}

fn backend_down() -> Error {
    Error::Persistence(sqlx::Error::PoolTimedOut)
}

// ---------------------------------------------------------------------------
// Clock

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ---------------------------------------------------------------------------
// Backend

#[derive(Default)]
struct Inner {
    telemetry: Vec<(Uuid, Uuid, LocationSample)>,
    shifts: Vec<ShiftRecord>,
    profiles: HashMap<Uuid, DriverProfile>,
    fail_telemetry: bool,
    telemetry_delay: Option<Duration>,
    fail_shift_writes: bool,
    stale_reads: bool,
    telemetry_calls: usize,
    shift_calls: usize,
    profile_calls: usize,
}

/// In-memory backend with the same one-open-shift rule as the database.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_telemetry(&self, fail: bool) {
        self.inner.lock().unwrap().fail_telemetry = fail;
    }

    /// Every telemetry insert takes `delay` before completing.
    pub fn slow_telemetry(&self, delay: Duration) {
        self.inner.lock().unwrap().telemetry_delay = Some(delay);
    }

    pub fn fail_shift_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_shift_writes = fail;
    }

    /// Makes `find_open_shift` miss existing rows, as a concurrent device would see.
    pub fn stale_reads(&self, stale: bool) {
        self.inner.lock().unwrap().stale_reads = stale;
    }

    pub fn add_profile(&self, profile: DriverProfile) {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .insert(profile.id, profile);
    }

    pub fn seed_shift(&self, record: ShiftRecord) {
        self.inner.lock().unwrap().shifts.push(record);
    }

    pub fn shifts(&self) -> Vec<ShiftRecord> {
        self.inner.lock().unwrap().shifts.clone()
    }

    pub fn telemetry(&self) -> Vec<LocationSample> {
        self.inner
            .lock()
            .unwrap()
            .telemetry
            .iter()
            .map(|(_, _, s)| s.clone())
            .collect()
    }

    pub fn telemetry_calls(&self) -> usize {
        self.inner.lock().unwrap().telemetry_calls
    }

    pub fn shift_calls(&self) -> usize {
        self.inner.lock().unwrap().shift_calls
    }

    pub fn profile_calls(&self) -> usize {
        self.inner.lock().unwrap().profile_calls
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn insert_telemetry(&self, worker_id: Uuid, sample: &LocationSample) -> Result<Uuid> {
        let delay = {
            let mut inner = self.inner.lock().unwrap();
            inner.telemetry_calls += 1;
            inner.telemetry_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().unwrap();
        if inner.fail_telemetry {
            return Err(backend_down());
        }
        let id = Uuid::new_v4();
        inner.telemetry.push((id, worker_id, sample.clone()));
        Ok(id)
    }
}

#[async_trait]
impl ShiftStore for MemoryStore {
    async fn find_open_shift(&self, worker_id: Uuid) -> Result<Option<ShiftRecord>> {
        let mut inner = self.inner.lock().unwrap();
        inner.shift_calls += 1;
        if inner.stale_reads {
            return Ok(None);
        }
        Ok(inner
            .shifts
            .iter()
            .filter(|s| s.worker_id == worker_id && s.is_open())
            .max_by_key(|s| s.start_time)
            .cloned())
    }

    async fn insert_shift(
        &self,
        worker_id: Uuid,
        start_time: DateTime<Utc>,
        start_odometer: i64,
    ) -> Result<ShiftRecord> {
        let mut inner = self.inner.lock().unwrap();
        inner.shift_calls += 1;
        if inner.fail_shift_writes {
            return Err(backend_down());
        }
        if inner
            .shifts
            .iter()
            .any(|s| s.worker_id == worker_id && s.is_open())
        {
            return Err(Error::ShiftAlreadyOpen);
        }
        let record = ShiftRecord {
            id: Uuid::new_v4(),
            worker_id,
            start_time,
            start_odometer,
            end_time: None,
            end_odometer: None,
            distance_km: None,
            duration_minutes: None,
        };
        inner.shifts.push(record.clone());
        Ok(record)
    }

    async fn close_shift(&self, shift_id: Uuid, closing: &ShiftClosing) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.shift_calls += 1;
        if inner.fail_shift_writes {
            return Err(backend_down());
        }
        let record = inner
            .shifts
            .iter_mut()
            .find(|s| s.id == shift_id && s.is_open())
            .ok_or(Error::NotOnDuty)?;
        *record = record.closed_with(closing);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn driver_profile(&self, worker_id: Uuid) -> Result<Option<DriverProfile>> {
        let mut inner = self.inner.lock().unwrap();
        inner.profile_calls += 1;
        Ok(inner.profiles.get(&worker_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Alert stream

/// Alert source driven by the test. Each subscription gets a fresh channel.
#[derive(Default)]
pub struct ChannelAlertSource {
    senders: Mutex<Vec<mpsc::UnboundedSender<Result<EmergencyAlert>>>>,
}

impl ChannelAlertSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscriptions(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    /// Delivers to the most recent subscription. Returns false if it is gone.
    pub fn push(&self, alert: EmergencyAlert) -> bool {
        self.senders
            .lock()
            .unwrap()
            .last()
            .map(|tx| tx.send(Ok(alert)).is_ok())
            .unwrap_or(false)
    }

    pub fn fail(&self) {
        if let Some(tx) = self.senders.lock().unwrap().last() {
            let _ = tx.send(Err(Error::Stream("connection reset".into())));
        }
    }

    pub fn current_is_closed(&self) -> bool {
        self.senders
            .lock()
            .unwrap()
            .last()
            .map(|tx| tx.is_closed())
            .unwrap_or(true)
    }
}

#[async_trait]
impl AlertSource for ChannelAlertSource {
    async fn subscribe(&self) -> Result<AlertStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }
}

// ---------------------------------------------------------------------------
// Attention cue

#[derive(Default)]
pub struct RecordingCue {
    signals: Mutex<Vec<Uuid>>,
}

impl RecordingCue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signals(&self) -> Vec<Uuid> {
        self.signals.lock().unwrap().clone()
    }
}

impl AttentionCue for RecordingCue {
    fn signal(&self, alert: &EmergencyAlert) {
        self.signals.lock().unwrap().push(alert.id);
    }
}

// ---------------------------------------------------------------------------
// Position sensor

/// Sensor whose events are pushed by the test.
#[derive(Default)]
pub struct ScriptedSensor {
    sink: Mutex<Option<mpsc::Sender<SensorEvent>>>,
    options: Mutex<Option<SamplerOptions>>,
    cleared: Mutex<Vec<WatchId>>,
    watches: AtomicUsize,
    unavailable: bool,
}

impl ScriptedSensor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            unavailable: true,
            ..Self::default()
        })
    }

    pub async fn emit(&self, event: SensorEvent) -> bool {
        let sink = self.sink.lock().unwrap().clone();
        match sink {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn options(&self) -> Option<SamplerOptions> {
        *self.options.lock().unwrap()
    }

    pub fn cleared(&self) -> Vec<WatchId> {
        self.cleared.lock().unwrap().clone()
    }
}

impl PositionSource for ScriptedSensor {
    fn watch(&self, options: SamplerOptions, sink: mpsc::Sender<SensorEvent>) -> Result<WatchId> {
        if self.unavailable {
            return Err(Error::SensorUnavailable);
        }
        let id = self.watches.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        *self.sink.lock().unwrap() = Some(sink);
        *self.options.lock().unwrap() = Some(options);
        Ok(WatchId(id))
    }

    fn clear_watch(&self, id: WatchId) {
        self.sink.lock().unwrap().take();
        self.cleared.lock().unwrap().push(id);
    }
}
