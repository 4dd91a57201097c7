//! Hub Implementation

use crate::session::Session;
use crate::{HubConfig, ServerEvent};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracking_model::AuthZ;
use uuid::Uuid;

/// Hub errors
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Unknown room: {0}")]
    UnknownRoom(String),

    #[error("Not authorised to join room {0}")]
    Unauthorized(String),

    #[error("Session is closed")]
    SessionClosed,
}

/// A parsed room name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Room {
    /// Every vehicle's movements; open to all authenticated sessions.
    Fleet,
    Vehicle(String),
    Company(String),
}

impl Room {
    pub fn parse(name: &str) -> Result<Self, HubError> {
        if name == "fleet" {
            return Ok(Room::Fleet);
        }
        if let Some(id) = name.strip_prefix("vehicle:") {
            if !id.is_empty() {
                return Ok(Room::Vehicle(id.to_string()));
            }
        }
        if let Some(id) = name.strip_prefix("company:") {
            if !id.is_empty() {
                return Ok(Room::Company(id.to_string()));
            }
        }
        Err(HubError::UnknownRoom(name.to_string()))
    }

    pub fn name(&self) -> String {
        match self {
            Room::Fleet => "fleet".to_string(),
            Room::Vehicle(id) => format!("vehicle:{id}"),
            Room::Company(id) => format!("company:{id}"),
        }
    }
}

/// Session registry plus room membership sets.
///
/// Publish snapshots a room's membership under a short lock, then enqueues
/// on each member's bounded queue; a slow consumer never blocks the
/// publisher or other sessions.
pub struct SubscriptionHub {
    config: HubConfig,
    authz: Arc<dyn AuthZ>,
    sessions: DashMap<Uuid, Arc<Session>>,
    rooms: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl SubscriptionHub {
    pub fn new(config: HubConfig, authz: Arc<dyn AuthZ>) -> Self {
        Self {
            config,
            authz,
            sessions: DashMap::new(),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a new session with an empty room set.
    pub fn connect(&self, principal: Option<tracking_model::Principal>) -> Arc<Session> {
        let session = Arc::new(Session::new(
            principal,
            self.config.session_queue_capacity,
        ));
        self.sessions.insert(session.id, Arc::clone(&session));
        info!(session_id = %session.id, "session connected");
        session
    }

    /// Join a room, subject to authorisation:
    /// `company:{id}` needs membership of that company (or admin);
    /// `vehicle:{id}` needs vehicle-scope access.
    pub async fn join(&self, session: &Arc<Session>, room_name: &str) -> Result<(), HubError> {
        if session.is_closed() {
            return Err(HubError::SessionClosed);
        }
        let room = Room::parse(room_name)?;
        self.authorize(session, &room).await?;

        let name = room.name();
        {
            let mut rooms = self.rooms.write().expect("room registry lock poisoned");
            rooms.entry(name.clone()).or_default().insert(session.id);
        }
        session
            .rooms
            .lock()
            .expect("session lock poisoned")
            .insert(name.clone());
        debug!(session_id = %session.id, room = %name, "joined room");
        Ok(())
    }

    /// Leave a room. Unknown or non-member rooms are a no-op.
    pub fn leave(&self, session: &Session, room_name: &str) {
        let mut rooms = self.rooms.write().expect("room registry lock poisoned");
        if let Some(members) = rooms.get_mut(room_name) {
            members.remove(&session.id);
            if members.is_empty() {
                rooms.remove(room_name);
            }
        }
        drop(rooms);
        session
            .rooms
            .lock()
            .expect("session lock poisoned")
            .remove(room_name);
    }

    /// Deliver `event` to every current member of `room_name`. Returns the
    /// number of sessions reached. Membership is evaluated now; late
    /// joiners see nothing.
    pub fn publish(&self, room_name: &str, event: &ServerEvent) -> usize {
        let members: Vec<Uuid> = {
            let rooms = self.rooms.read().expect("room registry lock poisoned");
            match rooms.get(room_name) {
                Some(members) => members.iter().copied().collect(),
                None => return 0,
            }
        };

        let mut reached = 0;
        for id in members {
            if let Some(session) = self.sessions.get(&id) {
                session.queue.push(event.clone());
                reached += 1;
            }
        }
        reached
    }

    /// Terminal transition: release room memberships, enqueue
    /// `session:closed` if a reason is given, and close the queue.
    pub fn disconnect(&self, session_id: Uuid, reason: Option<&str>) {
        let Some((_, session)) = self.sessions.remove(&session_id) else {
            return;
        };

        let names: Vec<String> = session.room_names();
        {
            let mut rooms = self.rooms.write().expect("room registry lock poisoned");
            for name in &names {
                if let Some(members) = rooms.get_mut(name) {
                    members.remove(&session_id);
                    if members.is_empty() {
                        rooms.remove(name);
                    }
                }
            }
        }
        session.rooms.lock().expect("session lock poisoned").clear();

        if let Some(reason) = reason {
            session.queue.push(ServerEvent::SessionClosed {
                reason: reason.to_string(),
            });
        }
        session.queue.close();
        info!(session_id = %session_id, dropped = session.dropped(), "session closed");
    }

    /// Close sessions that missed two heartbeats. Returns the closed ids.
    pub fn reap_idle(&self, now: Instant) -> Vec<Uuid> {
        let cutoff = self.config.idle_timeout();
        let idle: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.seen_at()) > cutoff)
            .map(|entry| entry.id)
            .collect();
        for id in &idle {
            warn!(session_id = %id, "closing idle session");
            self.disconnect(*id, Some("idle-timeout"));
        }
        idle
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Current member count of a room. Test and metrics hook.
    pub fn room_size(&self, room_name: &str) -> usize {
        self.rooms
            .read()
            .expect("room registry lock poisoned")
            .get(room_name)
            .map_or(0, |members| members.len())
    }

    async fn authorize(&self, session: &Session, room: &Room) -> Result<(), HubError> {
        match room {
            Room::Fleet => Ok(()),
            Room::Company(company_id) => {
                let principal = session
                    .principal
                    .as_ref()
                    .ok_or_else(|| HubError::Unauthorized(room.name()))?;
                if principal.admin || principal.company_id.as_deref() == Some(company_id.as_str())
                {
                    Ok(())
                } else {
                    Err(HubError::Unauthorized(room.name()))
                }
            }
            Room::Vehicle(vehicle_id) => {
                let principal = session
                    .principal
                    .as_ref()
                    .ok_or_else(|| HubError::Unauthorized(room.name()))?;
                if self.authz.can_access_vehicle(principal, vehicle_id).await {
                    Ok(())
                } else {
                    Err(HubError::Unauthorized(room.name()))
                }
            }
        }
    }
}
