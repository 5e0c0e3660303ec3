//! One worker's session: shift state, position tracking, and alert display.
//!
//! Every piece of per-session state lives here rather than in globals, so
//! independent sessions can run side by side. Subscriptions are released when
//! the session is closed or dropped.

use crate::alerts::{AlertChannel, AlertSubscription, AttentionCue, RetryPolicy};
use crate::clock::Clock;
use crate::error::Result;
use crate::models::{DriverProfile, DutyState};
use crate::sensor::{GpsStatus, LocationSampler, PositionSource, SamplerOptions, SensorEvent};
use crate::shift::ShiftController;
use crate::store::{AlertSource, ProfileStore, ShiftStore, TelemetryStore};
use crate::uplink::{TelemetryUplink, UplinkHandle, MIN_UPLOAD_INTERVAL};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Backend and device collaborators for a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub telemetry: Arc<dyn TelemetryStore>,
    pub shifts: Arc<dyn ShiftStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub alerts: Arc<dyn AlertSource>,
    pub cue: Arc<dyn AttentionCue>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub sampler: SamplerOptions,
    pub telemetry_min_interval: Duration,
    pub alert_retry: RetryPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sampler: SamplerOptions::default(),
            telemetry_min_interval: MIN_UPLOAD_INTERVAL,
            alert_retry: RetryPolicy::default(),
        }
    }
}

struct Tracking {
    task: JoinHandle<()>,
    uplink: UplinkHandle,
}

pub struct Session {
    worker_id: Uuid,
    deps: SessionDeps,
    settings: SessionSettings,
    profile: OnceCell<Option<DriverProfile>>,
    shift: ShiftController,
    alerts: AlertChannel,
    alert_subscription: Option<AlertSubscription>,
    gps_status: Arc<watch::Sender<GpsStatus>>,
    tracking: Option<Tracking>,
}

impl Session {
    /// Restores the worker's open shift from the backend and subscribes to alerts.
    pub async fn open(worker_id: Uuid, deps: SessionDeps, settings: SessionSettings) -> Result<Self> {
        let mut shift = ShiftController::new(worker_id, Arc::clone(&deps.shifts), Arc::clone(&deps.clock));
        shift.resume().await?;

        let alerts = AlertChannel::new(Arc::clone(&deps.cue));
        let alert_subscription = alerts.subscribe(Arc::clone(&deps.alerts), settings.alert_retry);
        let (gps_status, _) = watch::channel(GpsStatus::Searching);

        info!("Session opened for worker {}", worker_id);
        Ok(Self {
            worker_id,
            deps,
            settings,
            profile: OnceCell::new(),
            shift,
            alerts,
            alert_subscription: Some(alert_subscription),
            gps_status: Arc::new(gps_status),
            tracking: None,
        })
    }

    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    /// Driver profile, fetched on first call and cached for the session.
    pub async fn profile(&self) -> Result<Option<&DriverProfile>> {
        let profile = self
            .profile
            .get_or_try_init(|| async { self.deps.profiles.driver_profile(self.worker_id).await })
            .await?;
        Ok(profile.as_ref())
    }

    pub fn shift(&self) -> &ShiftController {
        &self.shift
    }

    pub fn shift_mut(&mut self) -> &mut ShiftController {
        &mut self.shift
    }

    pub fn duty_state(&self) -> &DutyState {
        self.shift.state()
    }

    pub fn alerts(&self) -> &AlertChannel {
        &self.alerts
    }

    pub fn gps_status(&self) -> GpsStatus {
        self.gps_status.borrow().clone()
    }

    pub fn watch_gps_status(&self) -> watch::Receiver<GpsStatus> {
        self.gps_status.subscribe()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_some()
    }

    /// Starts sampling positions and uploading them. Replaces any previous tracking.
    pub fn start_tracking(&mut self, source: Arc<dyn PositionSource>) -> Result<()> {
        self.stop_tracking();

        let mut subscription = LocationSampler::new(source).start(self.settings.sampler)?;
        let uplink = TelemetryUplink::new(
            self.worker_id,
            Arc::clone(&self.deps.telemetry),
            Arc::clone(&self.deps.clock),
            self.settings.telemetry_min_interval,
        )
        .spawn();
        let uplink_tx = uplink.sender();
        let status = Arc::clone(&self.gps_status);

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next_event().await {
                status.send_modify(|s| s.observe(&event));
                match event {
                    SensorEvent::Fix(sample) => uplink_tx.submit(sample),
                    SensorEvent::Fault(fault) => warn!("GPS error: {}", fault),
                }
            }
            debug!("position subscription ended");
        });

        self.tracking = Some(Tracking { task, uplink });
        info!("Tracking started for worker {}", self.worker_id);
        Ok(())
    }

    /// Stops sampling. Uploads already in flight are allowed to finish.
    pub fn stop_tracking(&mut self) {
        if let Some(tracking) = self.tracking.take() {
            tracking.task.abort();
            drop(tracking.uplink);
            info!("Tracking stopped for worker {}", self.worker_id);
        }
    }

    /// Releases all subscriptions and waits for queued telemetry uploads.
    pub async fn close(mut self) {
        if let Some(subscription) = self.alert_subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(tracking) = self.tracking.take() {
            tracking.task.abort();
            let _ = tracking.task.await;
            tracking.uplink.close().await;
        }
        info!("Session closed for worker {}", self.worker_id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.alert_subscription.take();
        self.stop_tracking();
    }
}
