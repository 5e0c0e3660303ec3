use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use uuid::Uuid;

use crate::alerts::RetryPolicy;
use crate::sensor::SamplerOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSourceKind {
    Postgres,
    Kafka,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub alert_topic: String,
    pub group_id: String,
    pub auto_offset_reset: String,
    pub sasl_mechanism: String,
    pub username: String,
    pub password: String,
    pub security_protocol: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: String,
    pub worker_id: Option<Uuid>,
    pub telemetry_min_interval: Duration,
    pub sampler: SamplerOptions,
    pub alert_source: AlertSourceKind,
    pub alert_retry: RetryPolicy,
    pub kafka: KafkaConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
                let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
                let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "duty_tracker".to_string());
                let db_user = env::var("DB_USER").unwrap_or_else(|_| "duty".to_string());
                let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "duty".to_string());
                format!(
                    "postgres://{}:{}@{}:{}/{}",
                    db_user, db_pwd, db_host, db_port, db_name
                )
            }
        };
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 10);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let worker_id = match env::var("WORKER_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(Uuid::parse_str(raw.trim()).map_err(|e| {
                Error::Config(format!("WORKER_ID {raw:?} is not a valid uuid: {e}"))
            })?),
            _ => None,
        };

        let telemetry_min_interval = Duration::from_secs(parse_or("TELEMETRY_MIN_INTERVAL_SECS", 30));

        let sampler = SamplerOptions {
            high_accuracy: parse_or("GPS_HIGH_ACCURACY", true),
            timeout: Duration::from_millis(parse_or("GPS_TIMEOUT_MS", 20_000)),
            maximum_age: Duration::from_millis(parse_or("GPS_MAX_AGE_MS", 5_000)),
        };

        let alert_source = match env::var("ALERT_SOURCE")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "pg" => AlertSourceKind::Postgres,
            "kafka" => AlertSourceKind::Kafka,
            other => {
                return Err(Error::Config(format!(
                    "ALERT_SOURCE must be 'postgres' or 'kafka', got {other:?}"
                )))
            }
        };
        let alert_retry = RetryPolicy {
            max_retries: parse_or("ALERT_MAX_RETRIES", 5),
            cooldown: Duration::from_secs(parse_or("ALERT_COOLDOWN_SECS", 30)),
            ..RetryPolicy::default()
        };

        let kafka = KafkaConfig {
            bootstrap_servers: env::var("KAFKA_BOOTSTRAP_SERVERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            alert_topic: env::var("KAFKA_ALERT_TOPIC")
                .unwrap_or_else(|_| "emergency-alerts".to_string()),
            // Every session must see every broadcast, so each process gets its own group.
            group_id: env::var("KAFKA_GROUP_ID")
                .unwrap_or_else(|_| format!("duty-tracker-{}", Uuid::new_v4())),
            auto_offset_reset: env::var("KAFKA_AUTO_OFFSET_RESET")
                .unwrap_or_else(|_| "latest".to_string()),
            sasl_mechanism: env::var("KAFKA_SASL_MECHANISM")
                .unwrap_or_else(|_| "SCRAM-SHA-256".to_string()),
            username: env::var("KAFKA_USERNAME").unwrap_or_default(),
            password: env::var("KAFKA_PASSWORD").unwrap_or_default(),
            security_protocol: env::var("KAFKA_SECURITY_PROTOCOL")
                .unwrap_or_else(|_| "PLAINTEXT".to_string()),
        };

        Ok(Self {
            database_url,
            db_max_connections,
            log_level,
            worker_id,
            telemetry_min_interval,
            sampler,
            alert_source,
            alert_retry,
            kafka,
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
