use crate::db::DbPool;
use crate::error::{Error, Result};
use crate::models::EmergencyAlert;
use crate::store::{AlertSource, AlertStream};
use async_trait::async_trait;
use futures::StreamExt;
use sqlx::postgres::PgListener;
use tracing::{info, warn};

/// NOTIFY channel used by the `notify_emergency_alert` trigger in the migrations.
pub const ALERT_NOTIFY_CHANNEL: &str = "emergency_alerts";

/// Receives alerts pushed by the `emergency_alerts` insert trigger via LISTEN/NOTIFY.
///
/// The trigger only notifies rows with `active = true`. NOTIFY has no replay,
/// so alerts inserted while disconnected are not delivered.
#[derive(Debug, Clone)]
pub struct PgAlertSource {
    pool: DbPool,
}

impl PgAlertSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertSource for PgAlertSource {
    async fn subscribe(&self) -> Result<AlertStream> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| Error::Stream(e.to_string()))?;
        listener
            .listen(ALERT_NOTIFY_CHANNEL)
            .await
            .map_err(|e| Error::Stream(e.to_string()))?;
        info!("Listening for alerts on channel: {}", ALERT_NOTIFY_CHANNEL);

        let stream = listener.into_stream().filter_map(|notification| async move {
            match notification {
                Ok(n) => match serde_json::from_str::<EmergencyAlert>(n.payload()) {
                    Ok(alert) => Some(Ok(alert)),
                    Err(e) => {
                        warn!("Failed to parse alert payload: {}", e);
                        None
                    }
                },
                Err(e) => Some(Err(Error::Stream(e.to_string()))),
            }
        });

        Ok(stream.boxed())
    }
}
