//! Alert Recorder
//!
//! Owns the persisted alert lifecycle. Transitions are forward-only and
//! idempotent on re-apply of the same target state.

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use geo_kernel::GeoPoint;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use storage::{AlertFilter, AlertStore, StorageError};
use thiserror::Error;
use tracing::{info, warn};
use tracking_model::{Alert, AlertStatus, Clock, Severity};
use uuid::Uuid;

/// Recorder errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alert not found")]
    NotFound,

    /// Backward lifecycle transition.
    #[error("Cannot move alert from {from} to {to}")]
    InvalidState {
        from: &'static str,
        to: &'static str,
    },

    #[error(transparent)]
    Store(#[from] StorageError),
}

/// Fields of an alert about to be raised; the recorder assigns id, status,
/// and creation time.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub vehicle_id: String,
    pub driver_id: Option<String>,
    pub shipment_id: Option<String>,
    pub zone_id: String,
    pub vehicle_location: GeoPoint,
    pub zone_location: GeoPoint,
    pub distance_m: f64,
    pub severity: Severity,
    pub accident_count: u32,
}

/// Aggregates over a look-back window.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatistics {
    pub total: u64,
    pub by_severity: HashMap<Severity, u64>,
    pub per_hour: Vec<HourBucket>,
    pub top_zones: Vec<ZoneCount>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBucket {
    pub hour: DateTime<Utc>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneCount {
    pub zone_id: String,
    pub count: u64,
}

const TOP_ZONE_LIMIT: usize = 10;

/// Persists alerts and applies lifecycle transitions.
pub struct AlertRecorder {
    store: Arc<dyn AlertStore>,
    clock: Arc<dyn Clock>,
}

impl AlertRecorder {
    pub fn new(store: Arc<dyn AlertStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Persist a new alert with status `active`.
    pub async fn create(&self, draft: AlertDraft) -> Result<Alert, AlertError> {
        let alert = Alert {
            id: Uuid::new_v4(),
            vehicle_id: draft.vehicle_id,
            driver_id: draft.driver_id,
            shipment_id: draft.shipment_id,
            zone_id: draft.zone_id,
            vehicle_location: draft.vehicle_location,
            zone_location: draft.zone_location,
            distance_m: draft.distance_m,
            severity: draft.severity,
            accident_count: draft.accident_count,
            status: AlertStatus::Active,
            created_at: self.clock.now(),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
        };
        self.store.insert(&alert).await?;
        info!(
            alert_id = %alert.id,
            vehicle_id = %alert.vehicle_id,
            zone_id = %alert.zone_id,
            severity = alert.severity.as_str(),
            "alert raised"
        );
        Ok(alert)
    }

    /// `active -> acknowledged`. Re-acknowledging is a no-op; acknowledging
    /// a resolved alert is invalid.
    pub async fn acknowledge(&self, id: Uuid, actor: &str) -> Result<Alert, AlertError> {
        let mut alert = self.store.fetch(id).await?.ok_or(AlertError::NotFound)?;
        match alert.status {
            AlertStatus::Active => {
                alert.status = AlertStatus::Acknowledged;
                alert.acknowledged_at = Some(self.clock.now());
                alert.acknowledged_by = Some(actor.to_string());
                self.store.update(&alert).await?;
            }
            AlertStatus::Acknowledged => {}
            AlertStatus::Resolved => {
                return Err(AlertError::InvalidState {
                    from: "resolved",
                    to: "acknowledged",
                })
            }
        }
        Ok(alert)
    }

    /// `{active, acknowledged} -> resolved`. Re-resolving is a no-op.
    pub async fn resolve(&self, id: Uuid, actor: &str) -> Result<Alert, AlertError> {
        let mut alert = self.store.fetch(id).await?.ok_or(AlertError::NotFound)?;
        if alert.status != AlertStatus::Resolved {
            alert.status = AlertStatus::Resolved;
            alert.resolved_at = Some(self.clock.now());
            alert.resolved_by = Some(actor.to_string());
            self.store.update(&alert).await?;
        }
        Ok(alert)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Alert>, AlertError> {
        Ok(self.store.fetch(id).await?)
    }

    pub async fn query(&self, filter: &AlertFilter) -> Result<Vec<Alert>, AlertError> {
        Ok(self.store.query(filter).await?)
    }

    /// Counts per hour, per severity, and busiest zones over `look_back`.
    pub async fn statistics(&self, look_back: Duration) -> Result<AlertStatistics, AlertError> {
        let now = self.clock.now();
        let since = now
            - ChronoDuration::from_std(look_back)
                .unwrap_or_else(|_| ChronoDuration::days(1));
        let alerts = self
            .store
            .query(&AlertFilter {
                since: Some(since),
                ..Default::default()
            })
            .await?;

        let mut by_severity: HashMap<Severity, u64> = HashMap::new();
        let mut hours: HashMap<DateTime<Utc>, u64> = HashMap::new();
        let mut zones: HashMap<String, u64> = HashMap::new();
        for alert in &alerts {
            *by_severity.entry(alert.severity).or_default() += 1;
            let hour = alert
                .created_at
                .duration_trunc(ChronoDuration::hours(1))
                .unwrap_or(alert.created_at);
            *hours.entry(hour).or_default() += 1;
            *zones.entry(alert.zone_id.clone()).or_default() += 1;
        }

        let mut per_hour: Vec<HourBucket> = hours
            .into_iter()
            .map(|(hour, count)| HourBucket { hour, count })
            .collect();
        per_hour.sort_by_key(|b| b.hour);

        let mut top_zones: Vec<ZoneCount> = zones
            .into_iter()
            .map(|(zone_id, count)| ZoneCount { zone_id, count })
            .collect();
        top_zones.sort_by(|a, b| b.count.cmp(&a.count).then(a.zone_id.cmp(&b.zone_id)));
        top_zones.truncate(TOP_ZONE_LIMIT);

        Ok(AlertStatistics {
            total: alerts.len() as u64,
            by_severity,
            per_hour,
            top_zones,
        })
    }

    /// Purge resolved alerts older than `retention`. Returns the count.
    pub async fn purge_resolved(&self, retention: Duration) -> Result<u64, AlertError> {
        let cutoff = self.clock.now()
            - ChronoDuration::from_std(retention).unwrap_or_else(|_| ChronoDuration::days(30));
        let purged = self.store.purge_resolved_before(cutoff).await?;
        if purged > 0 {
            warn!(purged, "purged resolved alerts past retention");
        }
        Ok(purged)
    }
}
