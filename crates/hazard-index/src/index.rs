//! Zone Index Implementation

use geo_kernel::{distance_m, BoundingBox, GeoPoint};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use tracking_model::HazardZone;

/// One zone returned by a proximity query, with the exact distance.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneHit {
    pub zone: HazardZone,
    pub distance_m: f64,
}

/// Copy-on-write index over all hazard zones.
///
/// A bbox pre-filter plus linear scan is sufficient at fleet zone counts
/// (up to roughly 10^4 zones); the scan touches only the swap-free snapshot.
pub struct ZoneIndex {
    snapshot: RwLock<Arc<Vec<HazardZone>>>,
}

impl ZoneIndex {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Atomically replace the entire index contents.
    pub fn reload(&self, zones: Vec<HazardZone>) {
        let count = zones.len();
        *self.snapshot.write().expect("zone index lock poisoned") = Arc::new(zones);
        info!(zones = count, "hazard index reloaded");
    }

    /// Insert or replace a single zone, swapping in a rebuilt snapshot.
    pub fn upsert(&self, zone: HazardZone) {
        let mut guard = self.snapshot.write().expect("zone index lock poisoned");
        let mut zones: Vec<HazardZone> = guard.as_ref().clone();
        match zones.iter_mut().find(|z| z.id == zone.id) {
            Some(existing) => *existing = zone,
            None => zones.push(zone),
        }
        *guard = Arc::new(zones);
    }

    /// Remove a zone by id. Returns whether it was present.
    pub fn remove(&self, zone_id: &str) -> bool {
        let mut guard = self.snapshot.write().expect("zone index lock poisoned");
        let before = guard.len();
        let zones: Vec<HazardZone> = guard
            .iter()
            .filter(|z| z.id != zone_id)
            .cloned()
            .collect();
        let removed = zones.len() != before;
        if removed {
            *guard = Arc::new(zones);
            debug!(zone_id, "hazard zone removed from index");
        }
        removed
    }

    /// The current immutable snapshot of all zones.
    pub fn snapshot(&self) -> Arc<Vec<HazardZone>> {
        Arc::clone(&self.snapshot.read().expect("zone index lock poisoned"))
    }

    /// All zones within `radius_m` of `point`, ascending by distance.
    ///
    /// Never fails; an empty index yields an empty list.
    pub fn near(&self, point: GeoPoint, radius_m: f64) -> Vec<ZoneHit> {
        let snapshot = self.snapshot();
        let bbox = BoundingBox::around(point, radius_m);

        let mut hits: Vec<ZoneHit> = snapshot
            .iter()
            .filter(|zone| bbox.contains(zone.position))
            .filter_map(|zone| {
                let d = distance_m(point, zone.position);
                (d <= radius_m).then(|| ZoneHit {
                    zone: zone.clone(),
                    distance_m: d,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance_m
                .partial_cmp(&b.distance_m)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits
    }

    /// The `k` closest zones to `point`, ascending by distance.
    pub fn nearest_k(&self, point: GeoPoint, k: usize) -> Vec<ZoneHit> {
        let snapshot = self.snapshot();
        let mut hits: Vec<ZoneHit> = snapshot
            .iter()
            .map(|zone| ZoneHit {
                zone: zone.clone(),
                distance_m: distance_m(point, zone.position),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance_m
                .partial_cmp(&b.distance_m)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        hits
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl Default for ZoneIndex {
    fn default() -> Self {
        Self::new()
    }
}
