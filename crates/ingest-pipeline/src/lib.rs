//! Ingest Pipeline
//!
//! The control path for one location or telemetry update: admit, normalise,
//! persist, evaluate hazard zones, record alerts, fan out. Persistence
//! failures fail the request; fan-out is best-effort per session.

mod pipeline;
mod validate;

pub use pipeline::{Ack, IngestOutcome, IngestPipeline, PipelineConfig};
pub use validate::{IngestError, LocationUpdate, TelemetryUpdate};
