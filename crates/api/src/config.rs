//! Application configuration
//!
//! Layered: built-in defaults, then an optional `config/tracking.toml`,
//! then `TRACKING_*` environment overrides (`__` as section separator).

use alert_engine::AlertConfig;
use serde::Deserialize;
use std::time::Duration;
use subscription_hub::HubConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listen address for the HTTP/WebSocket server.
    pub bind_addr: String,
    /// SQLite URL; unset means in-memory stores.
    pub database_url: Option<String>,
    /// Tracing filter, e.g. `info` or `api=debug,tower_http=info`.
    pub log_filter: String,
    pub alert: AlertConfig,
    pub hub: HubConfig,
    pub rate_limit: RateLimitConfig,
    /// History retention TTL in seconds (default: 7 days).
    pub history_ttl_secs: u64,
    /// History cap per vehicle series.
    pub history_cap: usize,
    /// Row cap for history queries.
    pub history_limit_cap: usize,
    /// Active-fleet freshness window in seconds.
    pub active_freshness_secs: u64,
    /// Deadline for durable steps in seconds.
    pub request_deadline_secs: u64,
    /// Assumed average speed for ETA estimates (km/h).
    pub avg_speed_kmh: f64,
    /// Radius cap for nearby-zone queries (meters).
    pub nearby_radius_cap_m: f64,
    /// Days a resolved alert is kept before purging.
    pub alert_retention_days: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            log_filter: "info".to_string(),
            alert: AlertConfig::default(),
            hub: HubConfig::default(),
            rate_limit: RateLimitConfig::default(),
            history_ttl_secs: 7 * 24 * 3600,
            history_cap: 10_000,
            history_limit_cap: 1_000,
            active_freshness_secs: 300,
            request_deadline_secs: 10,
            avg_speed_kmh: 40.0,
            nearby_radius_cap_m: 50_000.0,
            alert_retention_days: 30,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("config/tracking").required(false))
            .add_source(config::Environment::with_prefix("TRACKING").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn history_ttl(&self) -> Duration {
        Duration::from_secs(self.history_ttl_secs)
    }

    pub fn active_freshness(&self) -> Duration {
        Duration::from_secs(self.active_freshness_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn alert_retention(&self) -> Duration {
        Duration::from_secs(self.alert_retention_days * 24 * 3600)
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Seconds per replenished request (GCRA interval).
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately).
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 1,
            burst_size: 50,
        }
    }
}
