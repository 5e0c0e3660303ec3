use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Only error-level alerts flash on screen.
    pub fn is_flashing(self) -> bool {
        matches!(self, Severity::Error)
    }
}

/// Operator-issued broadcast, as pushed by the backend on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyAlert {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(alias = "level")]
    pub severity: Severity,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
