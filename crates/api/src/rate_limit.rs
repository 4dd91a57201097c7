//! Rate Limiting Middleware using GCRA Algorithm
//!
//! IP-based limiting on the ingest surface via tower_governor. GCRA gives
//! accurate enforcement without background bookkeeping.

use crate::config::RateLimitConfig;
use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;

/// Governor config with peer-IP keying and X-RateLimit-* response headers.
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Build the governor config. Requires the service to be started with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the peer IP is
/// available for key extraction.
pub fn create_governor_config(config: &RateLimitConfig) -> Arc<DefaultGovernorConfig> {
    Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.per_second)
            .burst_size(config.burst_size)
            .use_headers()
            .finish()
            .expect("rate limit config must be non-zero"),
    )
}
