//! Store trait boundaries

use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracking_model::{Alert, AlertStatus, Fix, HazardZone, TelemetryRecord};
use uuid::Uuid;

/// Durable backing for the hazard index.
#[async_trait]
pub trait ZoneStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<HazardZone>, StorageError>;
    async fn upsert(&self, zone: &HazardZone) -> Result<(), StorageError>;
    /// Returns whether the zone existed.
    async fn delete(&self, zone_id: &str) -> Result<bool, StorageError>;
}

/// Durable sink for accepted fixes.
#[async_trait]
pub trait FixStore: Send + Sync {
    async fn append(&self, fix: &Fix) -> Result<(), StorageError>;
}

/// Durable sink for accepted telemetry records.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn append(&self, record: &TelemetryRecord) -> Result<(), StorageError>;
}

/// Selection criteria for alert queries. Results are ordered by
/// `created_at` descending; `before` is the pagination cursor.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub status: Option<AlertStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AlertFilter {
    /// Whether an alert matches every set criterion. `before`/`limit` are
    /// applied by the store, not here.
    pub fn matches(&self, alert: &Alert) -> bool {
        if let Some(v) = &self.vehicle_id {
            if alert.vehicle_id != *v {
                return false;
            }
        }
        if let Some(d) = &self.driver_id {
            if alert.driver_id.as_deref() != Some(d.as_str()) {
                return false;
            }
        }
        if let Some(s) = self.status {
            if alert.status != s {
                return false;
            }
        }
        if let Some(since) = self.since {
            if alert.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if alert.created_at > until {
                return false;
            }
        }
        true
    }
}

/// Durable backing for the alert recorder.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert(&self, alert: &Alert) -> Result<(), StorageError>;
    async fn fetch(&self, id: Uuid) -> Result<Option<Alert>, StorageError>;
    /// Replace the stored row for `alert.id`. Errors with `NotFound` if the
    /// alert was never inserted.
    async fn update(&self, alert: &Alert) -> Result<(), StorageError>;
    async fn query(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StorageError>;
    /// Delete resolved alerts resolved before `cutoff`; returns the count.
    async fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}
