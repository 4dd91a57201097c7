//! Per-(vehicle, zone) alert deduplication

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Suppresses repeat alerts for the same `(vehicle, zone)` pair inside the
/// dedupe window.
///
/// The check-and-set is atomic per key (sharded map entry lock), so
/// concurrent ingests for the same pair emit at most one alert per window
/// while distinct pairs proceed independently.
pub struct AlertDeduper {
    window: Duration,
    last_emit: DashMap<(String, String), Instant>,
}

impl AlertDeduper {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_emit: DashMap::new(),
        }
    }

    /// Claim the right to emit for this pair at `now`. Returns `false` when
    /// a prior emit is still inside the window; on `true` the last-emit time
    /// is advanced to `now` in the same atomic step.
    pub fn try_claim(&self, vehicle_id: &str, zone_id: &str, now: Instant) -> bool {
        let key = (vehicle_id.to_string(), zone_id.to_string());
        match self.last_emit.entry(key) {
            Entry::Occupied(mut occupied) => {
                if now.saturating_duration_since(*occupied.get()) < self.window {
                    debug!(vehicle_id, zone_id, "alert suppressed inside dedupe window");
                    false
                } else {
                    occupied.insert(now);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }

    /// Drop entries whose window has fully elapsed. Correctness does not
    /// depend on when this runs; it only bounds memory.
    pub fn evict_expired(&self, now: Instant) {
        self.last_emit
            .retain(|_, last| now.saturating_duration_since(*last) < self.window);
    }

    /// Number of tracked pairs. Test and metrics hook.
    pub fn tracked_pairs(&self) -> usize {
        self.last_emit.len()
    }
}
