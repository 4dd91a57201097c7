//! Hub configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Subscription hub settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Outbound events buffered per session before drop-oldest kicks in
    /// (default: 256)
    pub session_queue_capacity: usize,
    /// Expected client heartbeat interval in seconds (default: 20). A
    /// session missing two heartbeats is closed.
    pub ping_interval_secs: u64,
}

impl HubConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Idle cutoff: two missed heartbeats.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs * 2)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            session_queue_capacity: 256,
            ping_interval_secs: 20,
        }
    }
}
