//! Hazard-Zone Index
//!
//! Keeps every hazard zone in memory for proximity queries on the ingest
//! hot path. Readers work against immutable copy-on-write snapshots;
//! `reload`/`upsert`/`remove` build a new snapshot and swap it in, so a
//! reader holding the previous snapshot still sees a consistent view.

mod index;

pub use index::{ZoneHit, ZoneIndex};
