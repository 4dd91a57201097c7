//! End-to-end scenarios against a running server

use api::{build_state, serve, AppConfig, Collaborators};
use chrono::{TimeZone, Utc};
use geo_kernel::GeoPoint;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracking_model::{
    AllowAllAuthz, InMemoryShipmentDirectory, InMemoryVehicleDirectory, ShipmentAssignment,
    SystemClock,
};

struct TestApp {
    base: String,
    client: reqwest::Client,
    shipments: Arc<InMemoryShipmentDirectory>,
}

impl TestApp {
    async fn spawn() -> Self {
        Self::spawn_with(AppConfig::default()).await
    }

    async fn spawn_with(mut config: AppConfig) -> Self {
        config.bind_addr = "127.0.0.1:0".to_string();
        let shipments = Arc::new(InMemoryShipmentDirectory::new());
        let vehicles = Arc::new(InMemoryVehicleDirectory::new());
        let collaborators = Collaborators {
            authz: Arc::new(AllowAllAuthz),
            vehicles,
            shipments: Arc::clone(&shipments) as Arc<dyn tracking_model::ShipmentDirectory>,
            clock: Arc::new(SystemClock),
        };
        let state = build_state(config, collaborators).await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            serve(listener, state).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            shipments: Arc::clone(&shipments),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base))
            .header("x-user-id", "tester")
            .header("x-admin", "true")
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base))
            .header("x-user-id", "tester")
            .header("x-admin", "true")
    }

    fn patch(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .patch(format!("{}{path}", self.base))
            .header("x-user-id", "tester")
            .header("x-admin", "true")
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(format!("{}{path}", self.base))
            .header("x-user-id", "tester")
            .header("x-admin", "true")
    }

    async fn seed_zone(&self, id: &str, lat: f64, lon: f64, severity: &str, count: u32) {
        let response = self
            .post("/tracking/geofences")
            .json(&json!({
                "id": id,
                "latitude": lat,
                "longitude": lon,
                "severity": severity,
                "accidentCount": count,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    async fn post_fix(&self, vehicle: &str, lat: f64, lon: f64, ts_secs: Option<i64>) -> Value {
        let mut body = json!({
            "vehicleId": vehicle,
            "latitude": lat,
            "longitude": lon,
            "speed": 35.0,
            "heading": 90.0,
        });
        if let Some(secs) = ts_secs {
            body["timestamp"] = json!(Utc.timestamp_opt(secs, 0).unwrap().to_rfc3339());
        }
        let response = self
            .post("/tracking/location")
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "fix ingest failed");
        response.json().await.unwrap()
    }
}

#[tokio::test]
async fn health_reports_components() {
    let app = TestApp::spawn().await;
    let body: Value = app.get("/health").send().await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["hazard_index"]["status"], "ok");
}

#[tokio::test]
async fn missing_identity_headers_are_unauthenticated() {
    let app = TestApp::spawn().await;
    let response = app
        .client
        .get(format!("{}/tracking/vehicle/T1/location", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn alert_raised_on_entering_hazard_zone() {
    let app = TestApp::spawn().await;
    app.seed_zone("Z1", 18.5204, 73.8589, "high", 23).await;

    let ack = app.post_fix("T1", 18.5210, 73.8595, Some(100)).await;
    assert_eq!(ack["ack"], "accepted");
    assert_eq!(ack["alertsEmitted"], 1);

    let alerts: Value = app
        .get("/accidents/alerts?vehicleId=T1")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alerts["meta"]["count"], 1);
    let alert = &alerts["data"][0];
    assert_eq!(alert["zoneId"], "Z1");
    assert_eq!(alert["severity"], "high");
    assert_eq!(alert["status"], "active");
    let distance = alert["distanceM"].as_f64().unwrap();
    assert!((60.0..=100.0).contains(&distance), "distance {distance}");
}

#[tokio::test]
async fn alert_lifecycle_ack_resolve() {
    let app = TestApp::spawn().await;
    app.seed_zone("Z1", 18.5204, 73.8589, "high", 23).await;
    app.post_fix("T1", 18.5210, 73.8595, Some(100)).await;

    let alerts: Value = app
        .get("/accidents/alerts")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = alerts["data"][0]["id"].as_str().unwrap().to_string();

    let acked: Value = app
        .patch(&format!("/accidents/alerts/{id}/ack"))
        .json(&json!({"acknowledgedBy": "ops"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(acked["status"], "acknowledged");
    assert_eq!(acked["acknowledgedBy"], "ops");

    // Idempotent re-ack.
    let response = app
        .patch(&format!("/accidents/alerts/{id}/ack"))
        .json(&json!({"acknowledgedBy": "other"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let reacked: Value = response.json().await.unwrap();
    assert_eq!(reacked["acknowledgedBy"], "ops");

    let resolved: Value = app
        .patch(&format!("/accidents/alerts/{id}/resolve"))
        .json(&json!({"resolvedBy": "ops"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resolved["status"], "resolved");

    // Backward transition is a conflict.
    let response = app
        .patch(&format!("/accidents/alerts/{id}/ack"))
        .json(&json!({"acknowledgedBy": "ops"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn dedupe_window_suppresses_then_permits() {
    let mut config = AppConfig::default();
    // Scaled-down window so the test can outlive it.
    config.alert.dedupe_window = Duration::from_millis(500);
    let app = TestApp::spawn_with(config).await;
    app.seed_zone("Z1", 18.5204, 73.8589, "high", 23).await;

    let first = app.post_fix("T1", 18.5210, 73.8595, Some(100)).await;
    assert_eq!(first["alertsEmitted"], 1);

    let second = app.post_fix("T1", 18.5210, 73.8595, Some(130)).await;
    assert_eq!(second["alertsEmitted"], 0);

    tokio::time::sleep(Duration::from_millis(600)).await;
    let third = app.post_fix("T1", 18.5210, 73.8595, Some(170)).await;
    assert_eq!(third["alertsEmitted"], 1);
}

#[tokio::test]
async fn out_of_order_fix_is_acked_stale() {
    let app = TestApp::spawn().await;
    app.post_fix("T1", 18.52, 73.85, Some(200)).await;

    let stale = app.post_fix("T1", 18.53, 73.86, Some(150)).await;
    assert_eq!(stale["ack"], "stale");
    assert_eq!(stale["alertsEmitted"], 0);

    let latest: Value = app
        .get("/tracking/vehicle/T1/location")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let captured = chrono::DateTime::parse_from_rfc3339(latest["capturedAt"].as_str().unwrap())
        .unwrap()
        .timestamp();
    assert_eq!(captured, 200);
    assert_eq!(latest["latitude"].as_f64().unwrap(), 18.52);
}

#[tokio::test]
async fn boundary_coordinates_accepted_beyond_rejected() {
    let app = TestApp::spawn().await;

    let ok = app
        .post("/tracking/location")
        .json(&json!({"vehicleId": "T-edge", "latitude": 90.0, "longitude": 180.0}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);

    let bad = app
        .post("/tracking/location")
        .json(&json!({"vehicleId": "T-edge", "latitude": 90.0001, "longitude": 0.0}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
    let body: Value = bad.json().await.unwrap();
    assert_eq!(body["error"]["code"], "validation");
}

#[tokio::test]
async fn unknown_vehicle_location_is_not_found() {
    let app = TestApp::spawn().await;
    let response = app
        .get("/tracking/vehicle/ghost/location")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn history_is_descending_and_range_filtered() {
    let app = TestApp::spawn().await;
    for ts in [100, 200, 300, 400] {
        app.post_fix("T1", 18.52, 73.85, Some(ts)).await;
    }

    // 'Z'-suffixed timestamps survive URL query encoding ('+' would not).
    let start = Utc
        .timestamp_opt(150, 0)
        .unwrap()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let end = Utc
        .timestamp_opt(350, 0)
        .unwrap()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let body: Value = app
        .get(&format!(
            "/tracking/vehicle/T1/history?startDate={start}&endDate={end}"
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["meta"]["count"], 2);
    let first = body["data"][0]["capturedAt"].as_str().unwrap();
    let second = body["data"][1]["capturedAt"].as_str().unwrap();
    assert!(first > second, "history must be newest first");

    let bad = app
        .get(&format!(
            "/tracking/vehicle/T1/history?startDate={end}&endDate={start}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
}

#[tokio::test]
async fn active_fleet_respects_bounds_and_freshness() {
    let app = TestApp::spawn().await;
    // Fresh fix inside the box, fresh fix outside, ancient fix inside.
    app.post_fix("T-in", 18.52, 73.85, None).await;
    app.post_fix("T-out", 28.70, 77.10, None).await;
    app.post_fix("T-old", 18.53, 73.86, Some(1000)).await;

    let body: Value = app
        .get("/tracking/vehicles/active?bounds=18.0,73.0,19.0,74.0")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["vehicleId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["T-in"]);

    let bad = app
        .get("/tracking/vehicles/active?bounds=18.0,73.0")
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
}

#[tokio::test]
async fn nearby_zones_sorted_and_capped() {
    let app = TestApp::spawn().await;
    app.seed_zone("near", 18.5213, 73.8589, "medium", 5).await;
    app.seed_zone("far", 18.5290, 73.8589, "low", 2).await;
    app.seed_zone("elsewhere", 28.70, 77.10, "high", 9).await;

    let body: Value = app
        .get("/accidents/nearby?lat=18.5204&lng=73.8589&radius=2000")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|z| z["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["near", "far"]);
    let d0 = body["data"][0]["distanceM"].as_f64().unwrap();
    let d1 = body["data"][1]["distanceM"].as_f64().unwrap();
    assert!(d0 < d1);

    let bad = app
        .get("/accidents/nearby?lat=95.0&lng=73.85")
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
}

#[tokio::test]
async fn heatmap_lists_all_zones() {
    let app = TestApp::spawn().await;
    app.seed_zone("Z1", 18.52, 73.85, "high", 23).await;
    app.seed_zone("Z2", 18.53, 73.86, "low", 2).await;

    let body: Value = app
        .get("/accidents/heatmap")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["meta"]["count"], 2);
}

#[tokio::test]
async fn geofence_delete_removes_from_index() {
    let app = TestApp::spawn().await;
    app.seed_zone("Z1", 18.5204, 73.8589, "high", 23).await;

    let response = app.delete("/tracking/geofences/Z1").send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = app
        .get("/accidents/nearby?lat=18.5204&lng=73.8589&radius=2000")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["meta"]["count"], 0);

    let again = app.delete("/tracking/geofences/Z1").send().await.unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn telemetry_round_trip() {
    let app = TestApp::spawn().await;
    let response = app
        .post("/tracking/telemetry")
        .json(&json!({
            "vehicleId": "T1",
            "engineStatus": "on",
            "fuelLevel": 64.0,
            "odometer": 42000.0,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = app
        .get("/tracking/vehicle/T1/telemetry")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["fuelLevel"].as_f64().unwrap(), 64.0);
    assert_eq!(body["engineStatus"], "on");
}

#[tokio::test]
async fn shipment_eta_matches_distance_over_speed() {
    let app = TestApp::spawn().await;
    app.shipments.assign(
        "S1",
        ShipmentAssignment {
            vehicle_id: "T1".to_string(),
            destination: GeoPoint::new(28.70, 77.10).unwrap(),
        },
    );
    app.post_fix("T1", 18.52, 73.85, None).await;

    let before = Utc::now();
    let body: Value = app
        .get("/tracking/shipment/S1/eta")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let distance_km = body["distanceKm"].as_f64().unwrap();
    assert!(
        (1160.0..=1195.0).contains(&distance_km),
        "distance {distance_km}"
    );

    // eta = now + distance / 40 km/h, within a small scheduling slack.
    let eta = chrono::DateTime::parse_from_rfc3339(body["eta"].as_str().unwrap()).unwrap();
    let expected_secs = distance_km / 40.0 * 3600.0;
    let actual_secs = (eta.with_timezone(&Utc) - before).num_seconds() as f64;
    assert!(
        (actual_secs - expected_secs).abs() < 60.0,
        "eta off by {}",
        actual_secs - expected_secs
    );
    assert!(body["etaFormatted"].as_str().unwrap().ends_with('m'));
}

#[tokio::test]
async fn shipment_without_assignment_conflicts() {
    let app = TestApp::spawn().await;
    let response = app.get("/tracking/shipment/ghost/eta").send().await.unwrap();
    assert_eq!(response.status(), 409);

    // Assigned but never reported: not found.
    app.shipments.assign(
        "S1",
        ShipmentAssignment {
            vehicle_id: "silent".to_string(),
            destination: GeoPoint::new(28.70, 77.10).unwrap(),
        },
    );
    let response = app.get("/tracking/shipment/S1/eta").send().await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn stats_aggregate_recent_alerts() {
    let app = TestApp::spawn().await;
    app.seed_zone("Z1", 18.5204, 73.8589, "high", 23).await;
    app.post_fix("T1", 18.5210, 73.8595, Some(100)).await;

    let body: Value = app
        .get("/accidents/stats?hours=24")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["bySeverity"]["high"], 1);
    assert_eq!(body["topZones"][0]["zoneId"], "Z1");
}
