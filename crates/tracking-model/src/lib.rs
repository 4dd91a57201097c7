//! Fleet-Tracking Domain Model
//!
//! Shared types for fixes, telemetry, hazard zones, and alerts, plus the
//! collaborator traits (authorisation, directories, clock) the core consumes
//! but does not implement.

mod alert;
mod collaborators;
mod fix;
mod zone;

pub use alert::{Alert, AlertStatus};
pub use collaborators::{
    AllowAllAuthz, AuthZ, Clock, InMemoryShipmentDirectory, InMemoryVehicleDirectory, Principal,
    ShipmentAssignment, ShipmentDirectory, SystemClock, VehicleDirectory,
};
pub use fix::{Fix, TelemetryRecord};
pub use zone::{HazardZone, Severity};
