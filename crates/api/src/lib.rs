//! Fleet-Tracking API Server
//!
//! REST and WebSocket boundary over the tracking core: ingest endpoints,
//! dashboard pull queries, geofence CRUD, alert lifecycle, and the push
//! channel.

use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use hazard_index::ZoneIndex;
use ingest_pipeline::{IngestPipeline, PipelineConfig};
use location_store::{LocationStore, LocationStoreConfig};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::{
    AlertStore, FixStore, InMemoryAlertStore, InMemoryFixStore, InMemoryTelemetryStore,
    InMemoryZoneStore, SqliteStore, TelemetryStore, ZoneStore,
};
use subscription_hub::SubscriptionHub;
use tokio::net::TcpListener;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracking_model::{
    AllowAllAuthz, AuthZ, Clock, InMemoryShipmentDirectory, InMemoryVehicleDirectory,
    ShipmentDirectory, SystemClock, VehicleDirectory,
};

pub mod auth;
mod config;
mod error;
mod rate_limit;
mod routes;
mod ws;

pub use alert_engine::AlertRecorder;
pub use config::{AppConfig, RateLimitConfig};
pub use error::ApiError;

/// Application state shared across handlers.
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: IngestPipeline,
    pub locations: Arc<LocationStore>,
    pub zones: Arc<ZoneIndex>,
    pub recorder: Arc<AlertRecorder>,
    pub hub: Arc<SubscriptionHub>,
    pub zone_store: Arc<dyn ZoneStore>,
    pub shipments: Arc<dyn ShipmentDirectory>,
    pub clock: Arc<dyn Clock>,
    pub start_time: Instant,
}

/// Platform services the core consumes but does not own.
pub struct Collaborators {
    pub authz: Arc<dyn AuthZ>,
    pub vehicles: Arc<dyn VehicleDirectory>,
    pub shipments: Arc<dyn ShipmentDirectory>,
    pub clock: Arc<dyn Clock>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            authz: Arc::new(AllowAllAuthz),
            vehicles: Arc::new(InMemoryVehicleDirectory::new()),
            shipments: Arc::new(InMemoryShipmentDirectory::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Wire stores, index, hub, and pipeline into shared state. SQLite when a
/// database URL is configured, in-memory otherwise. The hazard index is
/// seeded from the zone store.
pub async fn build_state(
    config: AppConfig,
    collaborators: Collaborators,
) -> anyhow::Result<Arc<AppState>> {
    let (zone_store, fix_store, telemetry_store, alert_store): (
        Arc<dyn ZoneStore>,
        Arc<dyn FixStore>,
        Arc<dyn TelemetryStore>,
        Arc<dyn AlertStore>,
    ) = match &config.database_url {
        Some(url) => {
            let store = Arc::new(SqliteStore::connect(url).await?);
            (
                store.clone(),
                store.clone(),
                store.clone(),
                store,
            )
        }
        None => {
            info!("no database configured, using in-memory stores");
            (
                Arc::new(InMemoryZoneStore::new()),
                Arc::new(InMemoryFixStore::new()),
                Arc::new(InMemoryTelemetryStore::new()),
                Arc::new(InMemoryAlertStore::new()),
            )
        }
    };

    let zones = Arc::new(ZoneIndex::new());
    zones.reload(zone_store.load_all().await?);
    info!(zones = zones.len(), "hazard index seeded");

    let locations = Arc::new(LocationStore::new(
        LocationStoreConfig {
            history_ttl: config.history_ttl(),
            history_cap: config.history_cap,
        },
        fix_store,
        telemetry_store,
    ));
    let recorder = Arc::new(AlertRecorder::new(
        alert_store,
        Arc::clone(&collaborators.clock),
    ));
    let hub = Arc::new(SubscriptionHub::new(
        config.hub.clone(),
        Arc::clone(&collaborators.authz),
    ));
    let pipeline = IngestPipeline::new(
        PipelineConfig {
            request_deadline: config.request_deadline(),
        },
        config.alert.clone(),
        Arc::clone(&locations),
        Arc::clone(&zones),
        Arc::clone(&recorder),
        Arc::clone(&hub),
        collaborators.authz,
        collaborators.vehicles,
        Arc::clone(&collaborators.clock),
    );

    Ok(Arc::new(AppState {
        config,
        pipeline,
        locations,
        zones,
        recorder,
        hub,
        zone_store,
        shipments: collaborators.shipments,
        clock: collaborators.clock,
        start_time: Instant::now(),
    }))
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tracking/location", post(routes::tracking::post_location))
        .route("/tracking/telemetry", post(routes::tracking::post_telemetry))
        .route(
            "/tracking/vehicle/:id/location",
            get(routes::tracking::get_vehicle_location),
        )
        .route(
            "/tracking/vehicle/:id/history",
            get(routes::tracking::get_vehicle_history),
        )
        .route(
            "/tracking/vehicle/:id/telemetry",
            get(routes::tracking::get_vehicle_telemetry),
        )
        .route(
            "/tracking/vehicles/active",
            get(routes::tracking::get_active_vehicles),
        )
        .route(
            "/tracking/shipment/:id/location",
            get(routes::tracking::get_shipment_location),
        )
        .route(
            "/tracking/shipment/:id/eta",
            get(routes::tracking::get_shipment_eta),
        )
        .route(
            "/tracking/geofences",
            get(routes::tracking::list_geofences).post(routes::tracking::create_geofence),
        )
        .route(
            "/tracking/geofences/:id",
            delete(routes::tracking::delete_geofence),
        )
        .route("/tracking/ws", get(ws::ws_handler))
        .route("/accidents/heatmap", get(routes::accidents::heatmap))
        .route("/accidents/nearby", get(routes::accidents::nearby))
        .route("/accidents/alerts", get(routes::accidents::list_alerts))
        .route(
            "/accidents/alerts/:id/ack",
            patch(routes::accidents::acknowledge_alert),
        )
        .route(
            "/accidents/alerts/:id/resolve",
            patch(routes::accidents::resolve_alert),
        )
        .route("/accidents/stats", get(routes::accidents::alert_stats))
        .with_state(state)
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub hazard_index: ComponentHealth,
    pub location_store: ComponentHealth,
    pub hub: ComponentHealth,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub entries: usize,
}

async fn health_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            hazard_index: ComponentHealth {
                status: "ok".to_string(),
                entries: state.zones.len(),
            },
            location_store: ComponentHealth {
                status: "ok".to_string(),
                entries: state.locations.vehicle_count(),
            },
            hub: ComponentHealth {
                status: "ok".to_string(),
                entries: state.hub.session_count(),
            },
        },
    })
}

/// Initialize logging
pub fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Bind and serve until shutdown.
pub async fn run_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&state.config.bind_addr).await?;
    info!("Starting API server on {}", state.config.bind_addr);
    serve(listener, state).await
}

/// Serve on an already-bound listener. Used directly by tests.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    spawn_background_tasks(&state);

    let governor = rate_limit::create_governor_config(&state.config.rate_limit);
    let app = create_router(Arc::clone(&state))
        .layer(GovernorLayer { config: governor })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn spawn_background_tasks(state: &Arc<AppState>) {
    // Session reaper: closes clients that missed two heartbeats.
    let hub = Arc::clone(&state.hub);
    let ping_interval = state.config.hub.ping_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        loop {
            ticker.tick().await;
            hub.reap_idle(Instant::now());
        }
    });

    // Hourly housekeeping: dedupe-map eviction and alert retention.
    let state = Arc::clone(state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            state.pipeline.evict_expired_dedupe();
            if let Err(err) = state
                .recorder
                .purge_resolved(state.config.alert_retention())
                .await
            {
                warn!(%err, "alert retention purge failed");
            }
        }
    });
}
