//! Alert configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Alert evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Zone proximity radius in meters (default: 1000)
    pub alert_radius_m: f64,
    /// Minimum gap between alerts for the same (vehicle, zone) pair
    /// (default: 60 s)
    #[serde(with = "duration_secs")]
    pub dedupe_window: Duration,
    /// Score above which an alert is graded high (default: 5.0)
    pub high_threshold: f64,
    /// Score above which an alert is graded medium (default: 2.0)
    pub medium_threshold: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            alert_radius_m: 1000.0,
            dedupe_window: Duration::from_secs(60),
            high_threshold: 5.0,
            medium_threshold: 2.0,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
