use crate::config::KafkaConfig;
use crate::error::{Error, Result};
use crate::models::EmergencyAlert;
use crate::store::{AlertSource, AlertStream};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tracing::{info, warn};

/// Receives alerts published as JSON on a Kafka topic.
pub struct KafkaAlertSource {
    config: KafkaConfig,
}

impl KafkaAlertSource {
    pub fn new(config: KafkaConfig) -> Self {
        Self { config }
    }

    fn consumer(&self) -> Result<StreamConsumer> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.config.bootstrap_servers)
            .set("group.id", &self.config.group_id)
            .set("auto.offset.reset", &self.config.auto_offset_reset)
            .set("security.protocol", &self.config.security_protocol);

        if self.config.security_protocol.to_uppercase().starts_with("SASL") {
            client_config
                .set("sasl.mechanism", &self.config.sasl_mechanism)
                .set("sasl.username", &self.config.username)
                .set("sasl.password", &self.config.password);
        }

        client_config
            .create()
            .map_err(|e| Error::Stream(e.to_string()))
    }
}

#[async_trait]
impl AlertSource for KafkaAlertSource {
    async fn subscribe(&self) -> Result<AlertStream> {
        info!("Initializing Kafka consumer for topic: {}", self.config.alert_topic);

        let consumer = self.consumer()?;
        consumer
            .subscribe(&[&self.config.alert_topic])
            .map_err(|e| Error::Stream(e.to_string()))?;
        info!("Subscribed to topic: {}", self.config.alert_topic);

        let payloads = stream::unfold(consumer, |consumer| async move {
            let item = match consumer.recv().await {
                Ok(m) => Ok(m.payload().map(|p| p.to_vec())),
                Err(e) => Err(Error::Stream(e.to_string())),
            };
            Some((item, consumer))
        });

        let alerts = payloads.filter_map(|item| async move {
            match item {
                Ok(Some(payload)) => match serde_json::from_slice::<EmergencyAlert>(&payload) {
                    Ok(alert) => Some(Ok(alert)),
                    Err(e) => {
                        warn!("Failed to parse alert message: {}", e);
                        None
                    }
                },
                Ok(None) => {
                    warn!("Received empty payload from Kafka");
                    None
                }
                Err(e) => Some(Err(e)),
            }
        });

        Ok(alerts.boxed())
    }
}
