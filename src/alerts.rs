//! Emergency broadcast display.
//!
//! Latest wins: a new alert replaces whatever is on screen, and acknowledgment
//! only clears the local display. Re-delivered alerts are shown again, even if
//! they were acknowledged before.

use crate::models::EmergencyAlert;
use crate::store::AlertSource;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Vibration pattern played when an alert is displayed: on, off, on.
pub const ATTENTION_PATTERN: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_millis(200),
    Duration::from_millis(500),
];

/// Local attention signal (haptics, sound) fired for every displayed alert.
pub trait AttentionCue: Send + Sync {
    fn signal(&self, alert: &EmergencyAlert);
}

/// Cue for devices without haptics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCue;

impl AttentionCue for LogCue {
    fn signal(&self, alert: &EmergencyAlert) {
        info!(alert_id = %alert.id, pattern = ?ATTENTION_PATTERN, "attention cue");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures before cooling down.
    pub max_retries: u32,
    pub cooldown: Duration,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            cooldown: Duration::from_secs(30),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Holds the currently displayed alert. Cheap to clone; clones share the display.
#[derive(Clone)]
pub struct AlertChannel {
    displayed: Arc<watch::Sender<Option<EmergencyAlert>>>,
    cue: Arc<dyn AttentionCue>,
}

impl AlertChannel {
    pub fn new(cue: Arc<dyn AttentionCue>) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            displayed: Arc::new(tx),
            cue,
        }
    }

    pub fn displayed(&self) -> Option<EmergencyAlert> {
        self.displayed.borrow().clone()
    }

    /// Presentation side: changes whenever an alert is shown or cleared.
    pub fn watch(&self) -> watch::Receiver<Option<EmergencyAlert>> {
        self.displayed.subscribe()
    }

    /// Displays `alert`, replacing any alert on screen. Returns false for inactive alerts.
    pub fn receive(&self, alert: EmergencyAlert) -> bool {
        if !alert.active {
            debug!(alert_id = %alert.id, "ignoring inactive alert");
            return false;
        }

        self.cue.signal(&alert);
        let alert_id = alert.id;
        let severity = alert.severity;
        match self.displayed.send_replace(Some(alert)) {
            Some(previous) => info!(
                alert_id = %alert_id,
                replaced = %previous.id,
                ?severity,
                "emergency alert replaced"
            ),
            None => info!(alert_id = %alert_id, ?severity, "emergency alert displayed"),
        }
        true
    }

    /// Clears the display. The backend record is untouched.
    pub fn acknowledge(&self) -> Option<EmergencyAlert> {
        let cleared = self.displayed.send_replace(None);
        if let Some(alert) = &cleared {
            info!(alert_id = %alert.id, "emergency alert acknowledged");
        }
        cleared
    }

    /// Starts feeding this channel from `source`, resubscribing on failure.
    pub fn subscribe(&self, source: Arc<dyn AlertSource>, policy: RetryPolicy) -> AlertSubscription {
        let task = tokio::spawn(run_subscription(self.clone(), source, policy));
        AlertSubscription { task }
    }
}

/// Live alert subscription. Dropping it unsubscribes.
pub struct AlertSubscription {
    task: JoinHandle<()>,
}

impl AlertSubscription {
    pub fn unsubscribe(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for AlertSubscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!("alert subscription released");
    }
}

async fn run_subscription(channel: AlertChannel, source: Arc<dyn AlertSource>, policy: RetryPolicy) {
    let mut consecutive_failures: u32 = 0;

    loop {
        if consecutive_failures >= policy.max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {:?}...",
                consecutive_failures, policy.cooldown
            );
            tokio::time::sleep(policy.cooldown).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resubscribing to alerts.");
        }

        let mut stream = match source.subscribe().await {
            Ok(stream) => stream,
            Err(e) => {
                consecutive_failures += 1;
                error!(
                    "Alert subscription failed: {} ({} / {})",
                    e, consecutive_failures, policy.max_retries
                );
                tokio::time::sleep(policy.retry_delay).await;
                continue;
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(alert) => {
                    consecutive_failures = 0;
                    channel.receive(alert);
                }
                Err(e) => {
                    error!("Alert stream error: {}", e);
                    break;
                }
            }
        }

        consecutive_failures += 1;
        warn!(
            "Alert stream closed; resubscribing ({} / {})",
            consecutive_failures, policy.max_retries
        );
        tokio::time::sleep(policy.retry_delay).await;
    }
}
