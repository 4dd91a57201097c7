//! Push-channel frame and event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracking_model::{Alert, Fix, Severity, TelemetryRecord};
use uuid::Uuid;

/// Client-to-server frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientFrame {
    Join { room: String },
    Leave { room: String },
    Ping,
}

/// Server-to-client events, serialized as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "fleet:location")]
    FleetLocation(LocationPayload),
    #[serde(rename = "vehicle:accident-zone-alert")]
    AccidentZoneAlert(AlertPayload),
    #[serde(rename = "vehicle:telemetry")]
    Telemetry(TelemetryPayload),
    #[serde(rename = "session:closed")]
    SessionClosed { reason: String },
    #[serde(rename = "pong")]
    Pong,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub heading: f64,
    pub captured_at: DateTime<Utc>,
}

impl From<&Fix> for LocationPayload {
    fn from(fix: &Fix) -> Self {
        Self {
            vehicle_id: fix.vehicle_id.clone(),
            latitude: fix.position.latitude,
            longitude: fix.position.longitude,
            speed: fix.speed_kmh,
            heading: fix.heading_deg,
            captured_at: fix.captured_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub alert_id: Uuid,
    pub vehicle_id: String,
    pub zone_id: String,
    pub distance_m: f64,
    pub severity: Severity,
    pub accident_count: u32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Alert> for AlertPayload {
    fn from(alert: &Alert) -> Self {
        Self {
            alert_id: alert.id,
            vehicle_id: alert.vehicle_id.clone(),
            zone_id: alert.zone_id.clone(),
            distance_m: alert.distance_m,
            severity: alert.severity,
            accident_count: alert.accident_count,
            message: format!(
                "Vehicle {} is {:.0} m from accident-prone zone {} ({} accidents recorded)",
                alert.vehicle_id, alert.distance_m, alert.zone_id, alert.accident_count
            ),
            timestamp: alert.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPayload {
    pub vehicle_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odometer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl From<&TelemetryRecord> for TelemetryPayload {
    fn from(record: &TelemetryRecord) -> Self {
        Self {
            vehicle_id: record.vehicle_id.clone(),
            engine_status: record.engine_status.clone(),
            fuel_level: record.fuel_level_pct,
            odometer: record.odometer_km,
            engine_temperature: record.engine_temperature_c,
            battery_voltage: record.battery_voltage,
            captured_at: record.captured_at,
        }
    }
}
