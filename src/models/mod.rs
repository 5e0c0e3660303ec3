pub mod alert;
pub mod fix;
pub mod location;
pub mod profile;
pub mod shift;

pub use alert::{EmergencyAlert, Severity};
pub use location::{Coordinates, LocationSample, TelemetryRecord};
pub use profile::DriverProfile;
pub use shift::{DutyState, ShiftClosing, ShiftRecord};
