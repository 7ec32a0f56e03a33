//! Connection registry — every live connection and its current state.
//!
//! Partners reference each other by [`ConnectionId`], never by direct
//! reference; all resolution goes back through this map. The registry has no
//! lock of its own: it is only reachable through the engine's critical
//! section, which serializes it with the queue set and the matcher.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use roulette_common::{ConnectionId, Profile, ServerEvent};

/// Where a connection currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Connected, not looking for a partner.
    Idle,
    /// In exactly one waiting pool.
    Waiting,
    /// Partnered; `partner` points at the other side.
    Paired,
}

/// In-memory record for one live connection.
pub struct User {
    pub id: ConnectionId,
    /// Set by the first `join-queue`; kept for re-queues after teardown.
    pub profile: Option<Profile>,
    /// The other half of the pair, when `phase == Paired`.
    pub partner: Option<ConnectionId>,
    pub phase: Phase,
    /// Handle into this connection's transport. Sends are non-blocking and
    /// fail silently once the connection is gone.
    outbound: UnboundedSender<ServerEvent>,
}

impl User {
    pub(crate) fn sender(&self) -> UnboundedSender<ServerEvent> {
        self.outbound.clone()
    }
}

/// Map of `connection_id → User`.
#[derive(Default)]
pub struct Registry {
    users: HashMap<ConnectionId, User>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a connection: mint an id and start it `Idle`.
    pub fn register(&mut self, outbound: UnboundedSender<ServerEvent>) -> ConnectionId {
        let id = ConnectionId::new();
        self.users.insert(
            id,
            User {
                id,
                profile: None,
                partner: None,
                phase: Phase::Idle,
                outbound,
            },
        );
        id
    }

    pub fn get(&self, id: ConnectionId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<User> {
        self.users.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Point-in-time view of every connection, for diagnostics.
    pub fn snapshot(&self) -> Vec<ConnectionSnapshot> {
        self.users
            .values()
            .map(|u| ConnectionSnapshot {
                id: u.id,
                phase: u.phase,
                partner: u.partner,
            })
            .collect()
    }
}

/// Diagnostic view of one connection.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub phase: Phase,
    pub partner: Option<ConnectionId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn register_starts_idle_with_no_partner() {
        let mut registry = Registry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);

        let user = registry.get(id).unwrap();
        assert_eq!(user.phase, Phase::Idle);
        assert!(user.partner.is_none());
        assert!(user.profile.is_none());
    }

    #[test]
    fn remove_forgets_the_connection() {
        let mut registry = Registry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);

        assert!(registry.remove(id).is_some());
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }
}
