//! Alert Engine
//!
//! Gatekeeper between geospatial hits and persisted alerts: severity
//! scoring, per-`(vehicle, zone)` deduplication, and the recorder that owns
//! the alert lifecycle and its queries.

mod config;
mod deduper;
mod recorder;
mod severity;

pub use config::AlertConfig;
pub use deduper::AlertDeduper;
pub use recorder::{
    AlertDraft, AlertError, AlertRecorder, AlertStatistics, HourBucket, ZoneCount,
};
pub use severity::{score, severity_for};
