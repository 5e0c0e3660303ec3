//! # duty-tracker
//!
//! Duty shifts, live position telemetry, and emergency broadcasts for mobile
//! workers, backed by Postgres.
//!
//! - [`sensor`]: position sampling behind a cancelable subscription
//! - [`uplink`]: throttled, fire-and-forget telemetry upload
//! - [`shift`]: the off-duty / on-duty state machine
//! - [`alerts`]: latest-wins alert display fed by a push stream
//! - [`session`]: wires the above together for one worker

pub mod alerts;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod models;
pub mod sensor;
pub mod session;
pub mod shift;
pub mod store;
pub mod uplink;

pub use error::{Error, Result};
