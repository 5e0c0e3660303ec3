use crate::error::SensorFault;
use crate::models::location::{Coordinates, LocationSample};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

/// One line of the device position feed. Numbers may arrive as strings.
#[derive(Debug, Deserialize)]
pub struct DeviceFix {
    #[serde(alias = "latitude", default, deserialize_with = "parse_f64_option")]
    pub lat: Option<f64>,
    #[serde(alias = "longitude", default, deserialize_with = "parse_f64_option")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub accuracy: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub speed: Option<f64>,
    #[serde(alias = "course", default, deserialize_with = "parse_f64_option")]
    pub heading: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<FixTime>,
}

/// RFC 3339 text or epoch milliseconds.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FixTime {
    EpochMillis(i64),
    Text(String),
}

impl DeviceFix {
    pub fn parse(line: &str) -> Result<DeviceFix, SensorFault> {
        serde_json::from_str(line)
            .map_err(|e| SensorFault::PositionUnavailable(format!("malformed fix: {e}")))
    }

    /// Converts into a sample; fixes without a timestamp are stamped `received_at`.
    pub fn into_sample(self, received_at: DateTime<Utc>) -> Result<LocationSample, SensorFault> {
        let (lat, lon) = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(SensorFault::PositionUnavailable(
                    "fix has no coordinates".to_string(),
                ))
            }
        };

        let captured_at = match self.timestamp {
            None => received_at,
            Some(FixTime::EpochMillis(ms)) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| bad_timestamp(&ms.to_string()))?,
            Some(FixTime::Text(text)) => {
                parse_fix_time(&text).ok_or_else(|| bad_timestamp(&text))?
            }
        };

        Ok(LocationSample {
            coords: Coordinates { lat, lon },
            accuracy: self.accuracy.unwrap_or(0.0),
            // NaN or negative speeds mean "not measured"
            speed: self.speed.filter(|s| s.is_finite() && *s >= 0.0),
            heading: self.heading.filter(|h| h.is_finite()),
            captured_at,
        })
    }
}

fn parse_fix_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    text.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn bad_timestamp(value: &str) -> SensorFault {
    SensorFault::PositionUnavailable(format!("invalid fix timestamp: '{value}'"))
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}
