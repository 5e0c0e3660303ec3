//! Position sampling.
//!
//! A [`PositionSource`] is the device side: it pushes fixes and faults into a
//! channel until its watch is cleared. [`LocationSampler`] turns one watch into a
//! [`SampleSubscription`], a non-restartable stream that releases the watch when
//! stopped or dropped.

pub mod feed;

use crate::error::{Result, SensorFault};
use crate::models::LocationSample;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

pub use feed::LineFeedSource;

const SAMPLE_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerOptions {
    /// Trade battery for precision.
    pub high_accuracy: bool,
    /// How long a position attempt may take before a `Timeout` fault.
    pub timeout: Duration,
    /// Oldest cached fix still acceptable instead of a fresh reading.
    pub maximum_age: Duration,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(20),
            maximum_age: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Fix(LocationSample),
    Fault(SensorFault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Device position sensor.
pub trait PositionSource: Send + Sync {
    /// Starts pushing events into `sink`. Returns `Error::SensorUnavailable`
    /// if the device cannot provide positions at all.
    fn watch(&self, options: SamplerOptions, sink: mpsc::Sender<SensorEvent>) -> Result<WatchId>;

    /// Stops the watch. Unknown or already-cleared ids are ignored.
    fn clear_watch(&self, id: WatchId);
}

pub struct LocationSampler {
    source: Arc<dyn PositionSource>,
}

impl LocationSampler {
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        Self { source }
    }

    pub fn start(&self, options: SamplerOptions) -> Result<SampleSubscription> {
        let (tx, rx) = mpsc::channel(SAMPLE_BUFFER);
        let watch = self.source.watch(options, tx)?;
        debug!(watch = watch.0, ?options, "position watch started");
        Ok(SampleSubscription {
            source: Arc::clone(&self.source),
            watch: Some(watch),
            rx,
        })
    }
}

/// Live sequence of sensor events for one session.
pub struct SampleSubscription {
    source: Arc<dyn PositionSource>,
    watch: Option<WatchId>,
    rx: mpsc::Receiver<SensorEvent>,
}

impl SampleSubscription {
    /// Next event, or `None` once stopped or the source has finished.
    pub async fn next_event(&mut self) -> Option<SensorEvent> {
        if self.watch.is_none() {
            return None;
        }
        self.rx.recv().await
    }

    pub fn is_active(&self) -> bool {
        self.watch.is_some()
    }

    /// Releases the sensor watch. Idempotent; nothing is delivered afterwards.
    pub fn stop(&mut self) {
        if let Some(watch) = self.watch.take() {
            self.source.clear_watch(watch);
            self.rx.close();
            while self.rx.try_recv().is_ok() {}
            debug!(watch = watch.0, "position watch cleared");
        }
    }
}

impl Stream for SampleSubscription {
    type Item = SensorEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SensorEvent>> {
        let this = self.get_mut();
        if this.watch.is_none() {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

impl Drop for SampleSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Indicator state derived from the most recent sensor event.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GpsStatus {
    #[default]
    Searching,
    Active {
        speed_kmh: Option<f64>,
    },
    Error(SensorFault),
}

impl GpsStatus {
    pub fn observe(&mut self, event: &SensorEvent) {
        *self = match event {
            SensorEvent::Fix(sample) => GpsStatus::Active {
                speed_kmh: sample.speed_kmh(),
            },
            SensorEvent::Fault(fault) => GpsStatus::Error(fault.clone()),
        };
    }

    pub fn label(&self) -> &'static str {
        match self {
            GpsStatus::Searching => "searching",
            GpsStatus::Active { .. } => "active",
            GpsStatus::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use chrono::Utc;

    fn fix(speed: Option<f64>) -> SensorEvent {
        SensorEvent::Fix(LocationSample {
            coords: Coordinates { lat: -23.55, lon: -46.63 },
            accuracy: 8.0,
            speed,
            heading: None,
            captured_at: Utc::now(),
        })
    }

    #[test]
    fn status_follows_latest_event() {
        let mut status = GpsStatus::default();
        assert_eq!(status.label(), "searching");

        status.observe(&fix(Some(12.5)));
        assert_eq!(status, GpsStatus::Active { speed_kmh: Some(45.0) });

        status.observe(&SensorEvent::Fault(SensorFault::Timeout));
        assert_eq!(status.label(), "error");

        // a transient fault does not stick once fixes resume
        status.observe(&fix(None));
        assert_eq!(status, GpsStatus::Active { speed_kmh: None });
    }
}
