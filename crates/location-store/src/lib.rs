//! Location Store
//!
//! Two logically separate stores behind one interface: a hot latest-fix
//! cache (one entry per vehicle, conditional writes drop out-of-order
//! fixes) and append-only history/telemetry series with TTL and per-series
//! cap retention. Accepted writes go through the durable store traits
//! before the caller is acknowledged.

mod store;

pub use store::{FixOutcome, LocationStore, LocationStoreConfig};
