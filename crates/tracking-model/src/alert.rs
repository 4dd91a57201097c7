//! Accident-zone alerts and their lifecycle

use crate::Severity;
use chrono::{DateTime, Utc};
use geo_kernel::GeoPoint;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert lifecycle state. Transitions are forward-only:
/// `Active -> Acknowledged -> Resolved`, with `Active -> Resolved` allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AlertStatus::Active),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(format!("unknown alert status: {other}")),
        }
    }
}

/// A raised proximity alert for a `(vehicle, zone)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub vehicle_id: String,
    pub driver_id: Option<String>,
    pub shipment_id: Option<String>,
    pub zone_id: String,
    pub vehicle_location: GeoPoint,
    pub zone_location: GeoPoint,
    pub distance_m: f64,
    pub severity: Severity,
    /// Zone accident count at the time the alert was raised.
    pub accident_count: u32,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_from_str() {
        for s in ["active", "acknowledged", "resolved"] {
            let status: AlertStatus = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
        assert!("open".parse::<AlertStatus>().is_err());
    }
}
