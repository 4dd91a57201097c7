//! Telemetry points reported by vehicles

use chrono::{DateTime, Utc};
use geo_kernel::GeoPoint;
use serde::{Deserialize, Serialize};

/// One immutable location reading from a vehicle.
///
/// `captured_at` is the device timestamp; `received_at` is stamped by the
/// ingest pipeline when the fix arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub vehicle_id: String,
    pub driver_id: Option<String>,
    pub shipment_id: Option<String>,
    pub position: GeoPoint,
    /// Ground speed in km/h, non-negative.
    pub speed_kmh: f64,
    /// Heading in degrees, normalised to [0, 360).
    pub heading_deg: f64,
    /// Horizontal accuracy estimate in meters, non-negative.
    pub accuracy_m: f64,
    pub altitude_m: Option<f64>,
    pub captured_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

/// One engine/fuel/odometer reading from a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub vehicle_id: String,
    pub engine_status: Option<String>,
    /// Fuel level as a percentage of tank capacity.
    pub fuel_level_pct: Option<f64>,
    pub odometer_km: Option<f64>,
    pub engine_temperature_c: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub captured_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}
