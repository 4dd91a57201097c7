//! Severity scoring
//!
//! A hit close to a zone with a heavy accident history outranks a distant
//! hit near a quiet one. The score is the zone's accident count scaled by
//! proximity; thresholds grade it. Monotone: severity never decreases as
//! distance shrinks or the count rises.

use crate::AlertConfig;
use tracking_model::Severity;

/// Proximity-weighted score: `accident_count * max(0, 1 - distance/radius)`.
pub fn score(distance_m: f64, alert_radius_m: f64, accident_count: u32) -> f64 {
    let d_factor = (1.0 - distance_m / alert_radius_m).max(0.0);
    accident_count as f64 * d_factor
}

/// Grade a score against the configured thresholds. A score exactly on a
/// threshold rounds toward the higher severity.
pub fn severity_for(score: f64, config: &AlertConfig) -> Severity {
    if score >= config.high_threshold {
        Severity::High
    } else if score >= config.medium_threshold {
        Severity::Medium
    } else {
        Severity::Low
    }
}
