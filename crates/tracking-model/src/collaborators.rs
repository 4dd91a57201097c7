//! Collaborator interfaces consumed by the core
//!
//! Authentication, vehicle/shipment ownership, and wall-clock time are owned
//! by the wider platform. The core talks to them through these traits; the
//! in-memory implementations here back tests and single-node deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use geo_kernel::GeoPoint;
use std::collections::HashMap;
use std::sync::RwLock;

/// The authenticated caller of a request or push-channel session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub company_id: Option<String>,
    pub admin: bool,
}

impl Principal {
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            company_id: None,
            admin: true,
        }
    }

    pub fn member(user_id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            company_id: Some(company_id.into()),
            admin: false,
        }
    }
}

/// Authorisation checks delegated to the platform.
#[async_trait]
pub trait AuthZ: Send + Sync {
    async fn can_access_vehicle(&self, principal: &Principal, vehicle_id: &str) -> bool;
}

/// Vehicle ownership lookups.
#[async_trait]
pub trait VehicleDirectory: Send + Sync {
    async fn company_of(&self, vehicle_id: &str) -> Option<String>;
}

/// The vehicle and destination a shipment is currently assigned to.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentAssignment {
    pub vehicle_id: String,
    pub destination: GeoPoint,
}

/// Shipment assignment lookups.
#[async_trait]
pub trait ShipmentDirectory: Send + Sync {
    async fn assignment_of(&self, shipment_id: &str) -> Option<ShipmentAssignment>;
}

/// Wall-clock source, injectable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Permits every caller. Used when an upstream gateway has already enforced
/// vehicle-scope access.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllAuthz;

#[async_trait]
impl AuthZ for AllowAllAuthz {
    async fn can_access_vehicle(&self, _principal: &Principal, _vehicle_id: &str) -> bool {
        true
    }
}

/// Vehicle directory backed by a map, with company-scope authorisation.
#[derive(Debug, Default)]
pub struct InMemoryVehicleDirectory {
    companies: RwLock<HashMap<String, String>>,
}

impl InMemoryVehicleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, vehicle_id: impl Into<String>, company_id: impl Into<String>) {
        self.companies
            .write()
            .expect("vehicle directory lock poisoned")
            .insert(vehicle_id.into(), company_id.into());
    }
}

#[async_trait]
impl VehicleDirectory for InMemoryVehicleDirectory {
    async fn company_of(&self, vehicle_id: &str) -> Option<String> {
        self.companies
            .read()
            .expect("vehicle directory lock poisoned")
            .get(vehicle_id)
            .cloned()
    }
}

#[async_trait]
impl AuthZ for InMemoryVehicleDirectory {
    async fn can_access_vehicle(&self, principal: &Principal, vehicle_id: &str) -> bool {
        if principal.admin {
            return true;
        }
        match (self.company_of(vehicle_id).await, &principal.company_id) {
            (Some(owner), Some(company)) => owner == *company,
            // Unregistered vehicles are visible only to admins.
            _ => false,
        }
    }
}

/// Shipment directory backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryShipmentDirectory {
    assignments: RwLock<HashMap<String, ShipmentAssignment>>,
}

impl InMemoryShipmentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, shipment_id: impl Into<String>, assignment: ShipmentAssignment) {
        self.assignments
            .write()
            .expect("shipment directory lock poisoned")
            .insert(shipment_id.into(), assignment);
    }

    pub fn clear(&self, shipment_id: &str) {
        self.assignments
            .write()
            .expect("shipment directory lock poisoned")
            .remove(shipment_id);
    }
}

#[async_trait]
impl ShipmentDirectory for InMemoryShipmentDirectory {
    async fn assignment_of(&self, shipment_id: &str) -> Option<ShipmentAssignment> {
        self.assignments
            .read()
            .expect("shipment directory lock poisoned")
            .get(shipment_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn company_scope_grants_and_denies() {
        let dir = InMemoryVehicleDirectory::new();
        dir.assign("T1", "acme");

        let member = Principal::member("u1", "acme");
        let outsider = Principal::member("u2", "other");
        let admin = Principal::admin("root");

        assert!(dir.can_access_vehicle(&member, "T1").await);
        assert!(!dir.can_access_vehicle(&outsider, "T1").await);
        assert!(admin.admin && dir.can_access_vehicle(&admin, "T1").await);
        // Unknown vehicle: members denied, admins allowed.
        assert!(!dir.can_access_vehicle(&member, "T9").await);
        assert!(dir.can_access_vehicle(&admin, "T9").await);
    }

    #[tokio::test]
    async fn shipment_assignments_round_trip() {
        let dir = InMemoryShipmentDirectory::new();
        assert!(dir.assignment_of("S1").await.is_none());

        dir.assign(
            "S1",
            ShipmentAssignment {
                vehicle_id: "T1".into(),
                destination: geo_kernel::GeoPoint::new(28.70, 77.10).unwrap(),
            },
        );
        let a = dir.assignment_of("S1").await.unwrap();
        assert_eq!(a.vehicle_id, "T1");

        dir.clear("S1");
        assert!(dir.assignment_of("S1").await.is_none());
    }
}
