//! Route handlers

pub mod accidents;
pub mod tracking;

use chrono::{DateTime, Utc};
use hazard_index::ZoneHit;
use serde::Serialize;
use tracking_model::{Fix, HazardZone, Severity, TelemetryRecord};

/// A fix at the HTTP boundary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixResponse {
    pub vehicle_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
    pub heading: f64,
    pub accuracy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    pub captured_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl From<&Fix> for FixResponse {
    fn from(fix: &Fix) -> Self {
        Self {
            vehicle_id: fix.vehicle_id.clone(),
            driver_id: fix.driver_id.clone(),
            shipment_id: fix.shipment_id.clone(),
            latitude: fix.position.latitude,
            longitude: fix.position.longitude,
            speed: fix.speed_kmh,
            heading: fix.heading_deg,
            accuracy: fix.accuracy_m,
            altitude: fix.altitude_m,
            captured_at: fix.captured_at,
            received_at: fix.received_at,
        }
    }
}

/// A telemetry record at the HTTP boundary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryResponse {
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

impl From<&TelemetryRecord> for TelemetryResponse {
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

/// A hazard zone at the HTTP boundary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneResponse {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub severity: Severity,
    pub accident_count: u32,
    pub last_updated: DateTime<Utc>,
}

impl From<&HazardZone> for ZoneResponse {
    fn from(zone: &HazardZone) -> Self {
        Self {
            id: zone.id.clone(),
            latitude: zone.position.latitude,
            longitude: zone.position.longitude,
            severity: zone.severity,
            accident_count: zone.accident_count,
            last_updated: zone.last_updated,
        }
    }
}

/// A proximity hit: zone plus exact distance.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneHitResponse {
    #[serde(flatten)]
    pub zone: ZoneResponse,
    pub distance_m: f64,
}

impl From<&ZoneHit> for ZoneHitResponse {
    fn from(hit: &ZoneHit) -> Self {
        Self {
            zone: ZoneResponse::from(&hit.zone),
            distance_m: hit.distance_m,
        }
    }
}

/// List envelope: rows plus count metadata.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub meta: ListMeta,
}

#[derive(Debug, Serialize)]
pub struct ListMeta {
    pub count: usize,
    pub limit: usize,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>, limit: usize) -> Self {
        let count = data.len();
        Self {
            data,
            meta: ListMeta { count, limit },
        }
    }
}
