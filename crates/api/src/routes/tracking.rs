//! Tracking Routes

use crate::auth::AuthPrincipal;
use crate::error::ApiError;
use crate::routes::{FixResponse, ListResponse, TelemetryResponse, ZoneResponse};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use geo_kernel::{distance_m, BoundingBox, GeoPoint};
use ingest_pipeline::{Ack, IngestOutcome, LocationUpdate, TelemetryUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracking_model::{HazardZone, Severity};
use uuid::Uuid;

/// POST /tracking/location
pub async fn post_location(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(update): Json<LocationUpdate>,
) -> Result<Json<IngestOutcome>, ApiError> {
    let outcome = state.pipeline.ingest_location(&principal, update).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
pub struct TelemetryAck {
    pub ack: Ack,
}

/// POST /tracking/telemetry
pub async fn post_telemetry(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(principal): AuthPrincipal,
    Json(update): Json<TelemetryUpdate>,
) -> Result<Json<TelemetryAck>, ApiError> {
    state.pipeline.ingest_telemetry(&principal, update).await?;
    Ok(Json(TelemetryAck { ack: Ack::Accepted }))
}

/// GET /tracking/vehicle/{id}/location
pub async fn get_vehicle_location(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Path(vehicle_id): Path<String>,
) -> Result<Json<FixResponse>, ApiError> {
    state
        .locations
        .latest(&vehicle_id)
        .map(|fix| Json(FixResponse::from(&fix)))
        .ok_or_else(|| ApiError::NotFound(format!("Vehicle {vehicle_id} has never reported")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// GET /tracking/vehicle/{id}/history
pub async fn get_vehicle_history(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Path(vehicle_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ListResponse<FixResponse>>, ApiError> {
    if let (Some(from), Some(to)) = (query.start_date, query.end_date) {
        if from > to {
            return Err(ApiError::Validation(
                "startDate must not be after endDate".to_string(),
            ));
        }
    }
    let limit = query
        .limit
        .unwrap_or(100)
        .min(state.config.history_limit_cap);
    let rows = state
        .locations
        .history(&vehicle_id, query.start_date, query.end_date, limit);
    let data: Vec<FixResponse> = rows.iter().map(FixResponse::from).collect();
    Ok(Json(ListResponse::new(data, limit)))
}

/// GET /tracking/vehicle/{id}/telemetry
pub async fn get_vehicle_telemetry(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Path(vehicle_id): Path<String>,
) -> Result<Json<TelemetryResponse>, ApiError> {
    state
        .locations
        .latest_telemetry(&vehicle_id)
        .map(|record| Json(TelemetryResponse::from(&record)))
        .ok_or_else(|| {
            ApiError::NotFound(format!("Vehicle {vehicle_id} has no telemetry"))
        })
}

#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    /// `S,W,N,E` in decimal degrees.
    pub bounds: String,
    /// Freshness window in seconds; defaults to the configured value.
    pub freshness: Option<u64>,
}

/// GET /tracking/vehicles/active
pub async fn get_active_vehicles(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<ListResponse<FixResponse>>, ApiError> {
    let bounds = parse_bounds(&query.bounds)?;
    let freshness = query
        .freshness
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| state.config.active_freshness());

    let fixes = state
        .locations
        .active_within(&bounds, freshness, state.clock.now());
    let count = fixes.len();
    let data: Vec<FixResponse> = fixes.iter().map(FixResponse::from).collect();
    Ok(Json(ListResponse::new(data, count)))
}

fn parse_bounds(raw: &str) -> Result<BoundingBox, ApiError> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| ApiError::Validation(format!("Malformed bounds: {raw}")))?;
    let [south, west, north, east] = parts[..] else {
        return Err(ApiError::Validation(
            "bounds must be S,W,N,E".to_string(),
        ));
    };
    // Corner validation catches swapped or out-of-range boxes early.
    GeoPoint::new(south, west).map_err(|e| ApiError::Validation(e.to_string()))?;
    GeoPoint::new(north, east).map_err(|e| ApiError::Validation(e.to_string()))?;
    if south > north {
        return Err(ApiError::Validation(
            "bounds south edge is above the north edge".to_string(),
        ));
    }
    Ok(BoundingBox::new(south, west, north, east))
}

/// GET /tracking/shipment/{id}/location
pub async fn get_shipment_location(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Path(shipment_id): Path<String>,
) -> Result<Json<FixResponse>, ApiError> {
    let assignment = state
        .shipments
        .assignment_of(&shipment_id)
        .await
        .ok_or_else(|| {
            ApiError::NotFound(format!("Shipment {shipment_id} has no active assignment"))
        })?;
    state
        .locations
        .latest(&assignment.vehicle_id)
        .map(|fix| Json(FixResponse::from(&fix)))
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Vehicle {} has never reported",
                assignment.vehicle_id
            ))
        })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtaResponse {
    pub shipment_id: String,
    pub vehicle_id: String,
    pub distance_km: f64,
    pub eta: DateTime<Utc>,
    pub eta_formatted: String,
}

/// GET /tracking/shipment/{id}/eta
///
/// Straight-line estimate: remaining distance over the configured average
/// speed. 409 when the shipment has no assignment, 404 when its vehicle
/// has no usable fix.
pub async fn get_shipment_eta(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Path(shipment_id): Path<String>,
) -> Result<Json<EtaResponse>, ApiError> {
    let assignment = state
        .shipments
        .assignment_of(&shipment_id)
        .await
        .ok_or_else(|| {
            ApiError::InvalidState(format!("Shipment {shipment_id} has no active assignment"))
        })?;
    let fix = state.locations.latest(&assignment.vehicle_id).ok_or_else(|| {
        ApiError::NotFound(format!(
            "Vehicle {} has never reported",
            assignment.vehicle_id
        ))
    })?;

    let distance_km = distance_m(fix.position, assignment.destination) / 1000.0;
    let hours = distance_km / state.config.avg_speed_kmh;
    let now = state.clock.now();
    let eta = now + ChronoDuration::seconds((hours * 3600.0).round() as i64);

    let total_minutes = (hours * 60.0).round() as i64;
    let eta_formatted = format!("{}h {:02}m", total_minutes / 60, total_minutes % 60);

    Ok(Json(EtaResponse {
        shipment_id,
        vehicle_id: assignment.vehicle_id,
        distance_km,
        eta,
        eta_formatted,
    }))
}

/// GET /tracking/geofences
pub async fn list_geofences(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
) -> Json<ListResponse<ZoneResponse>> {
    let snapshot = state.zones.snapshot();
    let count = snapshot.len();
    let data: Vec<ZoneResponse> = snapshot.iter().map(ZoneResponse::from).collect();
    Json(ListResponse::new(data, count))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneUpsertRequest {
    pub id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub severity: Option<Severity>,
    pub accident_count: Option<u32>,
}

/// POST /tracking/geofences
pub async fn create_geofence(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Json(request): Json<ZoneUpsertRequest>,
) -> Result<(StatusCode, Json<ZoneResponse>), ApiError> {
    let position = GeoPoint::new(request.latitude, request.longitude)
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let zone = HazardZone {
        id: request.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        position,
        severity: request.severity.unwrap_or(Severity::Low),
        accident_count: request.accident_count.unwrap_or(0),
        last_updated: state.clock.now(),
    };

    state.zone_store.upsert(&zone).await?;
    state.zones.upsert(zone.clone());
    Ok((StatusCode::CREATED, Json(ZoneResponse::from(&zone))))
}

/// DELETE /tracking/geofences/{id}
pub async fn delete_geofence(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Path(zone_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let existed = state.zone_store.delete(&zone_id).await?;
    state.zones.remove(&zone_id);
    if existed {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound(format!("Zone {zone_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_parse_round_trip() {
        let bbox = parse_bounds("18.0,73.0,19.0,74.0").unwrap();
        assert_eq!(bbox.south, 18.0);
        assert_eq!(bbox.east, 74.0);
    }

    #[test]
    fn malformed_bounds_rejected() {
        assert!(parse_bounds("18.0,73.0,19.0").is_err());
        assert!(parse_bounds("a,b,c,d").is_err());
        assert!(parse_bounds("91.0,73.0,95.0,74.0").is_err());
        assert!(parse_bounds("19.0,73.0,18.0,74.0").is_err());
    }
}
