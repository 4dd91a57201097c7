//! Location Store Implementation

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use geo_kernel::BoundingBox;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use storage::{FixStore, StorageError, TelemetryStore};
use tracing::{debug, warn};
use tracking_model::{Fix, TelemetryRecord};

/// Retention settings for the history and telemetry series.
#[derive(Debug, Clone)]
pub struct LocationStoreConfig {
    /// Maximum age of a history entry relative to the newest entry in its
    /// series (default: 7 days).
    pub history_ttl: Duration,
    /// Maximum entries kept per series; oldest evicted first (default: 10000).
    pub history_cap: usize,
}

impl Default for LocationStoreConfig {
    fn default() -> Self {
        Self {
            history_ttl: Duration::from_secs(7 * 24 * 3600),
            history_cap: 10_000,
        }
    }
}

/// Result of a conditional latest-cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// The fix advanced the vehicle's latest position.
    Accepted,
    /// The fix was older than (or identical to) the cached one and was
    /// dropped. Not an error.
    Stale,
}

/// Latest-fix cache plus per-vehicle history and telemetry series.
///
/// The cache and series live in sharded maps, so writers for distinct
/// vehicles proceed independently. Durable appends go through the store
/// traits before the write is acknowledged.
pub struct LocationStore {
    config: LocationStoreConfig,
    latest: DashMap<String, Fix>,
    history: DashMap<String, VecDeque<Fix>>,
    telemetry: DashMap<String, VecDeque<TelemetryRecord>>,
    fix_store: Arc<dyn FixStore>,
    telemetry_store: Arc<dyn TelemetryStore>,
}

impl LocationStore {
    pub fn new(
        config: LocationStoreConfig,
        fix_store: Arc<dyn FixStore>,
        telemetry_store: Arc<dyn TelemetryStore>,
    ) -> Self {
        Self {
            config,
            latest: DashMap::new(),
            history: DashMap::new(),
            telemetry: DashMap::new(),
            fix_store,
            telemetry_store,
        }
    }

    /// Record a fix: durable append, conditional latest update, history
    /// append with retention.
    ///
    /// Out-of-order drop: a fix whose `captured_at` is not strictly newer
    /// than the cached fix is dropped as [`FixOutcome::Stale`] before any
    /// durable write. Re-posting an identical fix is therefore a no-op.
    pub async fn record_fix(&self, fix: Fix) -> Result<FixOutcome, StorageError> {
        if let Some(existing) = self.latest.get(&fix.vehicle_id) {
            if fix.captured_at <= existing.captured_at {
                debug!(
                    vehicle_id = %fix.vehicle_id,
                    captured_at = %fix.captured_at,
                    cached_at = %existing.captured_at,
                    "dropping stale fix"
                );
                return Ok(FixOutcome::Stale);
            }
        }

        self.fix_store.append(&fix).await?;

        // Re-check under the entry lock; a concurrent newer fix wins the race.
        let accepted = match self.latest.entry(fix.vehicle_id.clone()) {
            Entry::Occupied(mut occupied) => {
                if fix.captured_at > occupied.get().captured_at {
                    occupied.insert(fix.clone());
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fix.clone());
                true
            }
        };
        if !accepted {
            return Ok(FixOutcome::Stale);
        }

        self.append_history(fix);
        Ok(FixOutcome::Accepted)
    }

    /// Record a telemetry reading: durable append plus in-memory series.
    pub async fn record_telemetry(&self, record: TelemetryRecord) -> Result<(), StorageError> {
        self.telemetry_store.append(&record).await?;

        let cap = self.config.history_cap;
        let ttl = chrono_ttl(self.config.history_ttl);
        let mut series = self.telemetry.entry(record.vehicle_id.clone()).or_default();
        let at = record.captured_at;
        insert_ordered(&mut series, record, |r| r.captured_at);
        evict(&mut series, cap, at - ttl, |r| r.captured_at);
        Ok(())
    }

    /// The most recent accepted fix for a vehicle.
    pub fn latest(&self, vehicle_id: &str) -> Option<Fix> {
        self.latest.get(vehicle_id).map(|f| f.value().clone())
    }

    /// The most recent telemetry record for a vehicle.
    pub fn latest_telemetry(&self, vehicle_id: &str) -> Option<TelemetryRecord> {
        self.telemetry
            .get(vehicle_id)
            .and_then(|series| series.back().cloned())
    }

    /// History rows for a vehicle within `[from, to]`, newest first,
    /// truncated to `limit`.
    pub fn history(
        &self,
        vehicle_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<Fix> {
        let Some(series) = self.history.get(vehicle_id) else {
            return Vec::new();
        };
        series
            .iter()
            .rev()
            .filter(|f| from.map_or(true, |from| f.captured_at >= from))
            .filter(|f| to.map_or(true, |to| f.captured_at <= to))
            .take(limit)
            .cloned()
            .collect()
    }

    /// The latest `n` history rows for a vehicle, newest first.
    pub fn latest_n(&self, vehicle_id: &str, n: usize) -> Vec<Fix> {
        self.history(vehicle_id, None, None, n)
    }

    /// Latest fixes inside `bounds` captured within `freshness` of `now`.
    pub fn active_within(
        &self,
        bounds: &BoundingBox,
        freshness: Duration,
        now: DateTime<Utc>,
    ) -> Vec<Fix> {
        let cutoff = now - chrono_ttl(freshness);
        let mut fixes: Vec<Fix> = self
            .latest
            .iter()
            .filter(|entry| entry.captured_at >= cutoff)
            .filter(|entry| bounds.contains(entry.position))
            .map(|entry| entry.value().clone())
            .collect();
        fixes.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
        fixes
    }

    /// Number of vehicles with a cached latest fix.
    pub fn vehicle_count(&self) -> usize {
        self.latest.len()
    }

    fn append_history(&self, fix: Fix) {
        let cap = self.config.history_cap;
        let ttl = chrono_ttl(self.config.history_ttl);
        let mut series = self.history.entry(fix.vehicle_id.clone()).or_default();
        let at = fix.captured_at;
        // Equal capture timestamps order by arrival.
        insert_ordered(&mut series, fix, |f| (f.captured_at, f.received_at));
        evict(&mut series, cap, at - ttl, |f| f.captured_at);
    }
}

fn chrono_ttl(ttl: Duration) -> ChronoDuration {
    ChronoDuration::from_std(ttl).unwrap_or_else(|_| {
        warn!("retention duration out of range, defaulting to 7 days");
        ChronoDuration::days(7)
    })
}

/// Insert keeping the series ordered by `key` ascending. Accepted fixes
/// normally arrive in order, so the common case is a push_back.
fn insert_ordered<T, K: Ord>(series: &mut VecDeque<T>, item: T, key: impl Fn(&T) -> K) {
    if series.back().map_or(true, |last| key(last) <= key(&item)) {
        series.push_back(item);
    } else {
        let at = series.partition_point(|existing| key(existing) <= key(&item));
        series.insert(at, item);
    }
}

/// Drop from the front while over the cap or older than the cutoff.
fn evict<T>(
    series: &mut VecDeque<T>,
    cap: usize,
    cutoff: DateTime<Utc>,
    key: impl Fn(&T) -> DateTime<Utc>,
) {
    while series.len() > cap {
        series.pop_front();
    }
    while series.front().map_or(false, |oldest| key(oldest) < cutoff) {
        series.pop_front();
    }
}
