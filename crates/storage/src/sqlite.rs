//! SQLite store implementation
//!
//! One pool shared by every trait implementation. Timestamps are stored as
//! RFC 3339 text, enums as their lowercase names, and coordinates as REAL
//! column pairs.

use crate::traits::{AlertFilter, AlertStore, FixStore, TelemetryStore, ZoneStore};
use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo_kernel::GeoPoint;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;
use tracking_model::{Alert, AlertStatus, Fix, HazardZone, Severity, TelemetryRecord};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS fixes (
        vehicle_id TEXT NOT NULL,
        driver_id TEXT,
        shipment_id TEXT,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        speed_kmh REAL NOT NULL,
        heading_deg REAL NOT NULL,
        accuracy_m REAL NOT NULL,
        altitude_m REAL,
        captured_at TEXT NOT NULL,
        received_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_fixes_vehicle_captured
        ON fixes (vehicle_id, captured_at)",
    "CREATE TABLE IF NOT EXISTS telemetry (
        vehicle_id TEXT NOT NULL,
        engine_status TEXT,
        fuel_level_pct REAL,
        odometer_km REAL,
        engine_temperature_c REAL,
        battery_voltage REAL,
        captured_at TEXT NOT NULL,
        received_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_telemetry_vehicle_captured
        ON telemetry (vehicle_id, captured_at)",
    "CREATE TABLE IF NOT EXISTS hazard_zones (
        id TEXT PRIMARY KEY,
        latitude REAL NOT NULL,
        longitude REAL NOT NULL,
        severity TEXT NOT NULL,
        accident_count INTEGER NOT NULL,
        last_updated TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS alerts (
        id TEXT PRIMARY KEY,
        vehicle_id TEXT NOT NULL,
        driver_id TEXT,
        shipment_id TEXT,
        zone_id TEXT NOT NULL,
        vehicle_lat REAL NOT NULL,
        vehicle_lon REAL NOT NULL,
        zone_lat REAL NOT NULL,
        zone_lon REAL NOT NULL,
        distance_m REAL NOT NULL,
        severity TEXT NOT NULL,
        accident_count INTEGER NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        acknowledged_at TEXT,
        acknowledged_by TEXT,
        resolved_at TEXT,
        resolved_by TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_alerts_vehicle_created
        ON alerts (vehicle_id, created_at)",
];

/// SQLite-backed implementation of every store trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect (creating the database file if missing) and apply the schema.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if url.contains(":memory:") {
            // Each pooled connection to :memory: is its own database; keep one.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!(url, "sqlite store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl FixStore for SqliteStore {
    async fn append(&self, fix: &Fix) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO fixes (vehicle_id, driver_id, shipment_id, latitude, longitude,
                speed_kmh, heading_deg, accuracy_m, altitude_m, captured_at, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&fix.vehicle_id)
        .bind(&fix.driver_id)
        .bind(&fix.shipment_id)
        .bind(fix.position.latitude)
        .bind(fix.position.longitude)
        .bind(fix.speed_kmh)
        .bind(fix.heading_deg)
        .bind(fix.accuracy_m)
        .bind(fix.altitude_m)
        .bind(fix.captured_at)
        .bind(fix.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for SqliteStore {
    async fn append(&self, record: &TelemetryRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO telemetry (vehicle_id, engine_status, fuel_level_pct, odometer_km,
                engine_temperature_c, battery_voltage, captured_at, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.vehicle_id)
        .bind(&record.engine_status)
        .bind(record.fuel_level_pct)
        .bind(record.odometer_km)
        .bind(record.engine_temperature_c)
        .bind(record.battery_voltage)
        .bind(record.captured_at)
        .bind(record.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ZoneStore for SqliteStore {
    async fn load_all(&self) -> Result<Vec<HazardZone>, StorageError> {
        let rows = sqlx::query("SELECT * FROM hazard_zones")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(zone_from_row).collect()
    }

    async fn upsert(&self, zone: &HazardZone) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO hazard_zones (id, latitude, longitude, severity, accident_count, last_updated)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                severity = excluded.severity,
                accident_count = excluded.accident_count,
                last_updated = excluded.last_updated",
        )
        .bind(&zone.id)
        .bind(zone.position.latitude)
        .bind(zone.position.longitude)
        .bind(zone.severity.as_str())
        .bind(zone.accident_count as i64)
        .bind(zone.last_updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, zone_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM hazard_zones WHERE id = ?")
            .bind(zone_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AlertStore for SqliteStore {
    async fn insert(&self, alert: &Alert) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO alerts (id, vehicle_id, driver_id, shipment_id, zone_id,
                vehicle_lat, vehicle_lon, zone_lat, zone_lon, distance_m, severity,
                accident_count, status, created_at, acknowledged_at, acknowledged_by,
                resolved_at, resolved_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(alert.id.to_string())
        .bind(&alert.vehicle_id)
        .bind(&alert.driver_id)
        .bind(&alert.shipment_id)
        .bind(&alert.zone_id)
        .bind(alert.vehicle_location.latitude)
        .bind(alert.vehicle_location.longitude)
        .bind(alert.zone_location.latitude)
        .bind(alert.zone_location.longitude)
        .bind(alert.distance_m)
        .bind(alert.severity.as_str())
        .bind(alert.accident_count as i64)
        .bind(alert.status.as_str())
        .bind(alert.created_at)
        .bind(alert.acknowledged_at)
        .bind(&alert.acknowledged_by)
        .bind(alert.resolved_at)
        .bind(&alert.resolved_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Alert>, StorageError> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(alert_from_row).transpose()
    }

    async fn update(&self, alert: &Alert) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE alerts SET status = ?, acknowledged_at = ?, acknowledged_by = ?,
                resolved_at = ?, resolved_by = ?
             WHERE id = ?",
        )
        .bind(alert.status.as_str())
        .bind(alert.acknowledged_at)
        .bind(&alert.acknowledged_by)
        .bind(alert.resolved_at)
        .bind(&alert.resolved_by)
        .bind(alert.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn query(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StorageError> {
        let mut builder =
            sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM alerts WHERE 1 = 1");
        if let Some(vehicle_id) = &filter.vehicle_id {
            builder.push(" AND vehicle_id = ").push_bind(vehicle_id);
        }
        if let Some(driver_id) = &filter.driver_id {
            builder.push(" AND driver_id = ").push_bind(driver_id);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(since) = filter.since {
            builder.push(" AND created_at >= ").push_bind(since);
        }
        if let Some(until) = filter.until {
            builder.push(" AND created_at <= ").push_bind(until);
        }
        if let Some(before) = filter.before {
            builder.push(" AND created_at < ").push_bind(before);
        }
        builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(alert_from_row).collect()
    }

    async fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "DELETE FROM alerts WHERE status = 'resolved'
                AND COALESCE(resolved_at, created_at) < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

fn point_from_row(row: &SqliteRow, lat_col: &str, lon_col: &str) -> Result<GeoPoint, StorageError> {
    let latitude: f64 = row.try_get(lat_col)?;
    let longitude: f64 = row.try_get(lon_col)?;
    GeoPoint::new(latitude, longitude).map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn zone_from_row(row: &SqliteRow) -> Result<HazardZone, StorageError> {
    let severity: String = row.try_get("severity")?;
    Ok(HazardZone {
        id: row.try_get("id")?,
        position: point_from_row(row, "latitude", "longitude")?,
        severity: Severity::from_str(&severity).map_err(StorageError::SerializationError)?,
        accident_count: row.try_get::<i64, _>("accident_count")? as u32,
        last_updated: row.try_get("last_updated")?,
    })
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert, StorageError> {
    let id: String = row.try_get("id")?;
    let severity: String = row.try_get("severity")?;
    let status: String = row.try_get("status")?;
    Ok(Alert {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::SerializationError(e.to_string()))?,
        vehicle_id: row.try_get("vehicle_id")?,
        driver_id: row.try_get("driver_id")?,
        shipment_id: row.try_get("shipment_id")?,
        zone_id: row.try_get("zone_id")?,
        vehicle_location: point_from_row(row, "vehicle_lat", "vehicle_lon")?,
        zone_location: point_from_row(row, "zone_lat", "zone_lon")?,
        distance_m: row.try_get("distance_m")?,
        severity: Severity::from_str(&severity).map_err(StorageError::SerializationError)?,
        accident_count: row.try_get::<i64, _>("accident_count")? as u32,
        status: AlertStatus::from_str(&status).map_err(StorageError::SerializationError)?,
        created_at: row.try_get("created_at")?,
        acknowledged_at: row.try_get("acknowledged_at")?,
        acknowledged_by: row.try_get("acknowledged_by")?,
        resolved_at: row.try_get("resolved_at")?,
        resolved_by: row.try_get("resolved_by")?,
    })
}
