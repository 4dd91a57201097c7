//! Pipeline Implementation

use crate::validate::{self, IngestError, LocationUpdate, TelemetryUpdate};
use alert_engine::{score, severity_for, AlertConfig, AlertDeduper, AlertDraft, AlertRecorder};
use geo_kernel::normalize_heading;
use hazard_index::ZoneIndex;
use location_store::{FixOutcome, LocationStore};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subscription_hub::{AlertPayload, LocationPayload, ServerEvent, SubscriptionHub, TelemetryPayload};
use tracing::{debug, info};
use tracking_model::{AuthZ, Clock, Fix, Principal, TelemetryRecord, VehicleDirectory};

/// Pipeline settings beyond alert evaluation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Deadline applied to each durable step (default: 10 s).
    pub request_deadline: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_deadline: Duration::from_secs(10),
        }
    }
}

/// How the latest-cache treated the fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ack {
    Accepted,
    /// Out-of-order fix dropped; still a success.
    Stale,
}

/// Result of one location ingest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub ack: Ack,
    pub alerts_emitted: usize,
}

/// Executes the ingest control path for location and telemetry updates.
pub struct IngestPipeline {
    config: PipelineConfig,
    alert_config: AlertConfig,
    locations: Arc<LocationStore>,
    zones: Arc<ZoneIndex>,
    deduper: AlertDeduper,
    recorder: Arc<AlertRecorder>,
    hub: Arc<SubscriptionHub>,
    authz: Arc<dyn AuthZ>,
    vehicles: Arc<dyn VehicleDirectory>,
    clock: Arc<dyn Clock>,
}

impl IngestPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        alert_config: AlertConfig,
        locations: Arc<LocationStore>,
        zones: Arc<ZoneIndex>,
        recorder: Arc<AlertRecorder>,
        hub: Arc<SubscriptionHub>,
        authz: Arc<dyn AuthZ>,
        vehicles: Arc<dyn VehicleDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let deduper = AlertDeduper::new(alert_config.dedupe_window);
        Self {
            config,
            alert_config,
            locations,
            zones,
            deduper,
            recorder,
            hub,
            authz,
            vehicles,
            clock,
        }
    }

    /// Ingest one location update.
    ///
    /// A stale fix short-circuits after the admit step with `ack=stale` and
    /// no zone evaluation or fan-out. Persistence failures abort before any
    /// event is published.
    pub async fn ingest_location(
        &self,
        principal: &Principal,
        update: LocationUpdate,
    ) -> Result<IngestOutcome, IngestError> {
        let position = validate::admit_location(&update)?;
        if !self
            .authz
            .can_access_vehicle(principal, &update.vehicle_id)
            .await
        {
            return Err(IngestError::Unauthorized(update.vehicle_id));
        }

        let now = self.clock.now();
        let fix = Fix {
            vehicle_id: update.vehicle_id,
            driver_id: update.driver_id,
            shipment_id: update.shipment_id,
            position,
            speed_kmh: update.speed.unwrap_or(0.0),
            heading_deg: normalize_heading(update.heading.unwrap_or(0.0)),
            accuracy_m: update.accuracy.unwrap_or(0.0),
            altitude_m: update.altitude,
            captured_at: update.timestamp.unwrap_or(now),
            received_at: now,
        };

        let outcome = self
            .deadline("persist-fix", self.locations.record_fix(fix.clone()))
            .await?;
        if outcome == FixOutcome::Stale {
            return Ok(IngestOutcome {
                ack: Ack::Stale,
                alerts_emitted: 0,
            });
        }

        // Hits come back ascending by distance; alerts emit in that order.
        let hits = self.zones.near(fix.position, self.alert_config.alert_radius_m);
        let claim_time = Instant::now();
        let mut alerts = Vec::new();
        for hit in hits {
            if !self
                .deduper
                .try_claim(&fix.vehicle_id, &hit.zone.id, claim_time)
            {
                continue;
            }
            let severity = severity_for(
                score(
                    hit.distance_m,
                    self.alert_config.alert_radius_m,
                    hit.zone.accident_count,
                ),
                &self.alert_config,
            );
            let draft = AlertDraft {
                vehicle_id: fix.vehicle_id.clone(),
                driver_id: fix.driver_id.clone(),
                shipment_id: fix.shipment_id.clone(),
                zone_id: hit.zone.id.clone(),
                vehicle_location: fix.position,
                zone_location: hit.zone.position,
                distance_m: hit.distance_m,
                severity,
                accident_count: hit.zone.accident_count,
            };
            let alert = self
                .deadline("record-alert", self.recorder.create(draft))
                .await?;
            alerts.push(alert);
        }

        let rooms = self.rooms_for(&fix.vehicle_id).await;
        let location_event = ServerEvent::FleetLocation(LocationPayload::from(&fix));
        for room in &rooms {
            self.hub.publish(room, &location_event);
        }
        for alert in &alerts {
            let alert_event = ServerEvent::AccidentZoneAlert(AlertPayload::from(alert));
            for room in &rooms {
                self.hub.publish(room, &alert_event);
            }
        }

        if !alerts.is_empty() {
            info!(
                vehicle_id = %fix.vehicle_id,
                alerts = alerts.len(),
                "accident-zone alerts emitted"
            );
        }
        Ok(IngestOutcome {
            ack: Ack::Accepted,
            alerts_emitted: alerts.len(),
        })
    }

    /// Ingest one telemetry update: same admit/persist/fan-out shape as the
    /// location path, without alert evaluation.
    pub async fn ingest_telemetry(
        &self,
        principal: &Principal,
        update: TelemetryUpdate,
    ) -> Result<(), IngestError> {
        validate::admit_telemetry(&update)?;
        if !self
            .authz
            .can_access_vehicle(principal, &update.vehicle_id)
            .await
        {
            return Err(IngestError::Unauthorized(update.vehicle_id));
        }

        let now = self.clock.now();
        let record = TelemetryRecord {
            vehicle_id: update.vehicle_id,
            engine_status: update.engine_status,
            fuel_level_pct: update.fuel_level,
            odometer_km: update.odometer,
            engine_temperature_c: update.engine_temperature,
            battery_voltage: update.battery_voltage,
            captured_at: update.timestamp.unwrap_or(now),
            received_at: now,
        };

        self.deadline(
            "persist-telemetry",
            self.locations.record_telemetry(record.clone()),
        )
        .await?;

        let rooms = self.rooms_for(&record.vehicle_id).await;
        let event = ServerEvent::Telemetry(TelemetryPayload::from(&record));
        for room in &rooms {
            self.hub.publish(room, &event);
        }
        debug!(vehicle_id = %record.vehicle_id, "telemetry recorded");
        Ok(())
    }

    /// Drop dedupe entries whose window has fully elapsed. Housekeeping
    /// hook for a background task.
    pub fn evict_expired_dedupe(&self) {
        self.deduper.evict_expired(Instant::now());
    }

    async fn rooms_for(&self, vehicle_id: &str) -> Vec<String> {
        let mut rooms = vec!["fleet".to_string(), format!("vehicle:{vehicle_id}")];
        if let Some(company) = self.vehicles.company_of(vehicle_id).await {
            rooms.push(format!("company:{company}"));
        }
        rooms
    }

    async fn deadline<T, E>(
        &self,
        step: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, IngestError>
    where
        IngestError: From<E>,
    {
        match tokio::time::timeout(self.config.request_deadline, fut).await {
            Ok(result) => result.map_err(IngestError::from),
            Err(_) => Err(IngestError::Timeout(step)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geo_kernel::GeoPoint;
    use hazard_index::ZoneIndex;
    use location_store::LocationStoreConfig;
    use storage::{InMemoryAlertStore, InMemoryFixStore, InMemoryTelemetryStore};
    use subscription_hub::{HubConfig, Session};
    use tracking_model::{
        AllowAllAuthz, HazardZone, InMemoryVehicleDirectory, Severity, SystemClock,
    };

    struct Harness {
        pipeline: IngestPipeline,
        hub: Arc<SubscriptionHub>,
    }

    fn harness(zones: Vec<HazardZone>) -> Harness {
        let directory = Arc::new(InMemoryVehicleDirectory::new());
        directory.assign("T1", "acme");
        let index = Arc::new(ZoneIndex::new());
        index.reload(zones);
        let hub = Arc::new(SubscriptionHub::new(
            HubConfig::default(),
            Arc::new(AllowAllAuthz),
        ));
        let locations = Arc::new(LocationStore::new(
            LocationStoreConfig::default(),
            Arc::new(InMemoryFixStore::new()),
            Arc::new(InMemoryTelemetryStore::new()),
        ));
        let recorder = Arc::new(AlertRecorder::new(
            Arc::new(InMemoryAlertStore::new()),
            Arc::new(SystemClock),
        ));
        let pipeline = IngestPipeline::new(
            PipelineConfig::default(),
            AlertConfig::default(),
            locations,
            index,
            recorder,
            Arc::clone(&hub),
            Arc::new(AllowAllAuthz),
            directory,
            Arc::new(SystemClock),
        );
        Harness { pipeline, hub }
    }

    fn hazard_zone() -> HazardZone {
        HazardZone {
            id: "Z1".to_string(),
            position: GeoPoint::new(18.5204, 73.8589).unwrap(),
            severity: Severity::High,
            accident_count: 23,
            last_updated: Utc::now(),
        }
    }

    fn update_at(ts: i64) -> LocationUpdate {
        LocationUpdate {
            vehicle_id: "T1".to_string(),
            driver_id: None,
            shipment_id: None,
            latitude: 18.5210,
            longitude: 73.8595,
            speed: Some(35.0),
            heading: Some(90.0),
            accuracy: Some(5.0),
            altitude: None,
            timestamp: Some(Utc.timestamp_opt(ts, 0).unwrap()),
        }
    }

    async fn join_fleet(hub: &Arc<SubscriptionHub>) -> Arc<Session> {
        let session = hub.connect(Some(Principal::admin("dash")));
        hub.join(&session, "fleet").await.unwrap();
        session
    }

    #[tokio::test]
    async fn alert_on_entering_zone() {
        let h = harness(vec![hazard_zone()]);
        let session = join_fleet(&h.hub).await;
        let principal = Principal::admin("device");

        let outcome = h
            .pipeline
            .ingest_location(&principal, update_at(100))
            .await
            .unwrap();
        assert_eq!(outcome.ack, Ack::Accepted);
        assert_eq!(outcome.alerts_emitted, 1);

        // Location event first, then the alert, both on the fleet room.
        let first = session.next_event().await.unwrap();
        assert!(matches!(first, ServerEvent::FleetLocation(_)));
        let second = session.next_event().await.unwrap();
        let ServerEvent::AccidentZoneAlert(payload) = second else {
            panic!("expected alert event, got {second:?}");
        };
        assert_eq!(payload.vehicle_id, "T1");
        assert_eq!(payload.zone_id, "Z1");
        assert_eq!(payload.severity, Severity::High);
        assert!(payload.distance_m > 60.0 && payload.distance_m < 100.0);
    }

    #[tokio::test]
    async fn repeat_fix_in_window_is_deduped() {
        let h = harness(vec![hazard_zone()]);
        let principal = Principal::admin("device");

        let first = h
            .pipeline
            .ingest_location(&principal, update_at(100))
            .await
            .unwrap();
        assert_eq!(first.alerts_emitted, 1);

        let second = h
            .pipeline
            .ingest_location(&principal, update_at(130))
            .await
            .unwrap();
        assert_eq!(second.ack, Ack::Accepted);
        assert_eq!(second.alerts_emitted, 0);
    }

    #[tokio::test]
    async fn out_of_order_fix_acks_stale() {
        let h = harness(vec![]);
        let principal = Principal::admin("device");

        h.pipeline
            .ingest_location(&principal, update_at(200))
            .await
            .unwrap();
        let stale = h
            .pipeline
            .ingest_location(&principal, update_at(150))
            .await
            .unwrap();
        assert_eq!(stale.ack, Ack::Stale);
        assert_eq!(stale.alerts_emitted, 0);
    }

    #[tokio::test]
    async fn stale_fix_publishes_nothing() {
        let h = harness(vec![]);
        let principal = Principal::admin("device");
        h.pipeline
            .ingest_location(&principal, update_at(200))
            .await
            .unwrap();

        let session = join_fleet(&h.hub).await;
        h.pipeline
            .ingest_location(&principal, update_at(150))
            .await
            .unwrap();
        h.hub.disconnect(session.id, None);
        assert_eq!(session.next_event().await, None);
    }

    #[tokio::test]
    async fn no_zone_means_no_alert() {
        let h = harness(vec![]);
        let principal = Principal::admin("device");
        let outcome = h
            .pipeline
            .ingest_location(&principal, update_at(100))
            .await
            .unwrap();
        assert_eq!(outcome.alerts_emitted, 0);
    }

    #[tokio::test]
    async fn company_room_receives_events() {
        let h = harness(vec![]);
        let session = h.hub.connect(Some(Principal::member("u1", "acme")));
        h.hub.join(&session, "company:acme").await.unwrap();

        h.pipeline
            .ingest_location(&Principal::admin("device"), update_at(100))
            .await
            .unwrap();
        assert!(matches!(
            session.next_event().await,
            Some(ServerEvent::FleetLocation(_))
        ));
    }

    #[tokio::test]
    async fn unauthorized_caller_is_rejected() {
        let directory = Arc::new(InMemoryVehicleDirectory::new());
        directory.assign("T1", "acme");
        let hub = Arc::new(SubscriptionHub::new(
            HubConfig::default(),
            Arc::new(AllowAllAuthz),
        ));
        let pipeline = IngestPipeline::new(
            PipelineConfig::default(),
            AlertConfig::default(),
            Arc::new(LocationStore::new(
                LocationStoreConfig::default(),
                Arc::new(InMemoryFixStore::new()),
                Arc::new(InMemoryTelemetryStore::new()),
            )),
            Arc::new(ZoneIndex::new()),
            Arc::new(AlertRecorder::new(
                Arc::new(InMemoryAlertStore::new()),
                Arc::new(SystemClock),
            )),
            hub,
            Arc::clone(&directory) as Arc<dyn AuthZ>,
            directory,
            Arc::new(SystemClock),
        );

        let outsider = Principal::member("u9", "rival");
        let err = pipeline
            .ingest_location(&outsider, update_at(100))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn telemetry_persists_and_fans_out() {
        let h = harness(vec![]);
        let session = join_fleet(&h.hub).await;

        let update = TelemetryUpdate {
            vehicle_id: "T1".to_string(),
            engine_status: Some("on".to_string()),
            fuel_level: Some(60.0),
            odometer: Some(42_000.0),
            engine_temperature: Some(90.0),
            battery_voltage: Some(12.4),
            timestamp: None,
        };
        h.pipeline
            .ingest_telemetry(&Principal::admin("device"), update)
            .await
            .unwrap();

        let event = session.next_event().await.unwrap();
        let ServerEvent::Telemetry(payload) = event else {
            panic!("expected telemetry event, got {event:?}");
        };
        assert_eq!(payload.fuel_level, Some(60.0));
    }
}
