//! Subscription Hub
//!
//! Long-lived push channel to dashboard clients. Sessions join named rooms
//! (`fleet`, `vehicle:{id}`, `company:{id}`); publishing to a room enqueues
//! the event on every current member's bounded queue. Slow consumers lose
//! their oldest queued events rather than blocking publishers.

mod config;
mod events;
mod hub;
mod session;

pub use config::HubConfig;
pub use events::{AlertPayload, ClientFrame, LocationPayload, ServerEvent, TelemetryPayload};
pub use hub::{HubError, Room, SubscriptionHub};
pub use session::Session;
