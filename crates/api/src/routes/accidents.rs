//! Accident-Zone Routes

use crate::auth::AuthPrincipal;
use crate::error::ApiError;
use crate::routes::{ListResponse, ZoneHitResponse, ZoneResponse};
use crate::AppState;
use alert_engine::AlertStatistics;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use geo_kernel::GeoPoint;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use storage::AlertFilter;
use tracking_model::{Alert, AlertStatus, Severity};
use uuid::Uuid;

/// An alert at the HTTP boundary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    pub id: Uuid,
    pub vehicle_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment_id: Option<String>,
    pub zone_id: String,
    pub distance_m: f64,
    pub severity: Severity,
    pub accident_count: u32,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

impl From<&Alert> for AlertResponse {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id,
            vehicle_id: alert.vehicle_id.clone(),
            driver_id: alert.driver_id.clone(),
            shipment_id: alert.shipment_id.clone(),
            zone_id: alert.zone_id.clone(),
            distance_m: alert.distance_m,
            severity: alert.severity,
            accident_count: alert.accident_count,
            status: alert.status,
            created_at: alert.created_at,
            acknowledged_at: alert.acknowledged_at,
            acknowledged_by: alert.acknowledged_by.clone(),
            resolved_at: alert.resolved_at,
            resolved_by: alert.resolved_by.clone(),
        }
    }
}

/// GET /accidents/heatmap
pub async fn heatmap(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
) -> Json<ListResponse<ZoneResponse>> {
    let snapshot = state.zones.snapshot();
    let count = snapshot.len();
    let data: Vec<ZoneResponse> = snapshot.iter().map(ZoneResponse::from).collect();
    Json(ListResponse::new(data, count))
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    /// Radius in meters; defaults to the alert radius, capped by config.
    pub radius: Option<f64>,
}

/// GET /accidents/nearby
pub async fn nearby(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<ListResponse<ZoneHitResponse>>, ApiError> {
    let point = GeoPoint::new(query.lat, query.lng)
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let radius = query
        .radius
        .unwrap_or(state.config.alert.alert_radius_m)
        .min(state.config.nearby_radius_cap_m);
    if radius <= 0.0 || !radius.is_finite() {
        return Err(ApiError::Validation(format!(
            "radius {radius} must be positive"
        )));
    }

    let hits = state.zones.near(point, radius);
    let count = hits.len();
    let data: Vec<ZoneHitResponse> = hits.iter().map(ZoneHitResponse::from).collect();
    Ok(Json(ListResponse::new(data, count)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsQuery {
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Pagination cursor: alerts created strictly before this instant.
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

const ALERT_LIMIT_CAP: usize = 500;

/// GET /accidents/alerts
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<ListResponse<AlertResponse>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<AlertStatus>()
                .map_err(ApiError::Validation)
        })
        .transpose()?;
    let limit = query.limit.unwrap_or(50).min(ALERT_LIMIT_CAP);

    let filter = AlertFilter {
        vehicle_id: query.vehicle_id,
        driver_id: query.driver_id,
        status,
        since: query.start_date,
        until: query.end_date,
        before: query.before,
        limit: Some(limit),
    };
    let alerts = state.recorder.query(&filter).await?;
    let data: Vec<AlertResponse> = alerts.iter().map(AlertResponse::from).collect();
    Ok(Json(ListResponse::new(data, limit)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequest {
    pub acknowledged_by: String,
}

/// PATCH /accidents/alerts/{id}/ack
pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Path(alert_id): Path<String>,
    Json(request): Json<AckRequest>,
) -> Result<Json<AlertResponse>, ApiError> {
    let id = parse_alert_id(&alert_id)?;
    let alert = state.recorder.acknowledge(id, &request.acknowledged_by).await?;
    Ok(Json(AlertResponse::from(&alert)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub resolved_by: String,
}

/// PATCH /accidents/alerts/{id}/resolve
pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Path(alert_id): Path<String>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<AlertResponse>, ApiError> {
    let id = parse_alert_id(&alert_id)?;
    let alert = state.recorder.resolve(id, &request.resolved_by).await?;
    Ok(Json(AlertResponse::from(&alert)))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Look-back window in hours (default: 24).
    pub hours: Option<u64>,
}

/// GET /accidents/stats
pub async fn alert_stats(
    State(state): State<Arc<AppState>>,
    AuthPrincipal(_principal): AuthPrincipal,
    Query(query): Query<StatsQuery>,
) -> Result<Json<AlertStatistics>, ApiError> {
    let hours = query.hours.unwrap_or(24).clamp(1, 24 * 90);
    let stats = state
        .recorder
        .statistics(Duration::from_secs(hours * 3600))
        .await?;
    Ok(Json(stats))
}

fn parse_alert_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::Validation(format!("Malformed alert id: {raw}")))
}
