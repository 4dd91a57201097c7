//! In-memory store implementations
//!
//! Default wiring for single-node runs and the test suites. Locks are held
//! only for the map operation itself.

use crate::traits::{AlertFilter, AlertStore, FixStore, TelemetryStore, ZoneStore};
use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use tracking_model::{Alert, AlertStatus, Fix, HazardZone, TelemetryRecord};
use uuid::Uuid;

fn lock_err<T>(err: std::sync::PoisonError<T>) -> StorageError {
    StorageError::DatabaseError(format!("Lock error: {err}"))
}

/// Zone store backed by a map keyed on zone id.
#[derive(Debug, Default)]
pub struct InMemoryZoneStore {
    zones: Mutex<HashMap<String, HazardZone>>,
}

impl InMemoryZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(zones: Vec<HazardZone>) -> Self {
        let map = zones.into_iter().map(|z| (z.id.clone(), z)).collect();
        Self {
            zones: Mutex::new(map),
        }
    }
}

#[async_trait]
impl ZoneStore for InMemoryZoneStore {
    async fn load_all(&self) -> Result<Vec<HazardZone>, StorageError> {
        let zones = self.zones.lock().map_err(lock_err)?;
        Ok(zones.values().cloned().collect())
    }

    async fn upsert(&self, zone: &HazardZone) -> Result<(), StorageError> {
        let mut zones = self.zones.lock().map_err(lock_err)?;
        zones.insert(zone.id.clone(), zone.clone());
        Ok(())
    }

    async fn delete(&self, zone_id: &str) -> Result<bool, StorageError> {
        let mut zones = self.zones.lock().map_err(lock_err)?;
        Ok(zones.remove(zone_id).is_some())
    }
}

/// Append-only fix log.
#[derive(Debug, Default)]
pub struct InMemoryFixStore {
    fixes: Mutex<Vec<Fix>>,
}

impl InMemoryFixStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of appended fixes. Test hook.
    pub fn len(&self) -> usize {
        self.fixes.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FixStore for InMemoryFixStore {
    async fn append(&self, fix: &Fix) -> Result<(), StorageError> {
        let mut fixes = self.fixes.lock().map_err(lock_err)?;
        fixes.push(fix.clone());
        Ok(())
    }
}

/// Append-only telemetry log.
#[derive(Debug, Default)]
pub struct InMemoryTelemetryStore {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    async fn append(&self, record: &TelemetryRecord) -> Result<(), StorageError> {
        let mut records = self.records.lock().map_err(lock_err)?;
        records.push(record.clone());
        Ok(())
    }
}

/// Alert store keyed on alert id.
#[derive(Debug, Default)]
pub struct InMemoryAlertStore {
    alerts: Mutex<HashMap<Uuid, Alert>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn insert(&self, alert: &Alert) -> Result<(), StorageError> {
        let mut alerts = self.alerts.lock().map_err(lock_err)?;
        alerts.insert(alert.id, alert.clone());
        debug!(alert_id = %alert.id, "alert inserted");
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Alert>, StorageError> {
        let alerts = self.alerts.lock().map_err(lock_err)?;
        Ok(alerts.get(&id).cloned())
    }

    async fn update(&self, alert: &Alert) -> Result<(), StorageError> {
        let mut alerts = self.alerts.lock().map_err(lock_err)?;
        match alerts.get_mut(&alert.id) {
            Some(existing) => {
                *existing = alert.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }

    async fn query(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StorageError> {
        let alerts = self.alerts.lock().map_err(lock_err)?;
        let mut matched: Vec<Alert> = alerts
            .values()
            .filter(|a| filter.matches(a))
            .filter(|a| filter.before.map_or(true, |b| a.created_at < b))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut alerts = self.alerts.lock().map_err(lock_err)?;
        let before = alerts.len();
        alerts.retain(|_, a| {
            !(a.status == AlertStatus::Resolved
                && a.resolved_at.map_or(a.created_at < cutoff, |r| r < cutoff))
        });
        Ok((before - alerts.len()) as u64)
    }
}
