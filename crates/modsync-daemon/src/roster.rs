//! In-memory player list.
//!
//! Joins and departures are published as [`RosterEvent`]s so runners can
//! react: the host asks newcomers for their versions, and a client that was
//! disconnected returns to the main menu.

use modsync_core::transport::{self, PeerRoster, TransportError};
use modsync_core::PeerId;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    Joined { peer_id: PeerId, name: String },
    /// `reason` is set when the host disconnected the peer.
    Left {
        peer_id: PeerId,
        reason: Option<String>,
    },
}

/// Players currently in the session.
pub struct InMemoryRoster {
    players: RwLock<HashMap<PeerId, String>>,
    events: broadcast::Sender<RosterEvent>,
}

impl Default for InMemoryRoster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoster {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            players: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RosterEvent> {
        self.events.subscribe()
    }

    pub fn join(&self, peer_id: PeerId, name: impl Into<String>) {
        let name = name.into();
        info!("{} ({}) joined the session", name, peer_id);
        self.players
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(peer_id, name.clone());
        let _ = self.events.send(RosterEvent::Joined { peer_id, name });
    }

    /// A player left on its own.
    pub fn leave(&self, peer_id: PeerId) -> bool {
        self.remove(peer_id, None)
    }

    pub fn len(&self) -> usize {
        self.players.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, peer_id: PeerId, reason: Option<String>) -> bool {
        let removed = self
            .players
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&peer_id)
            .is_some();
        if removed {
            let _ = self.events.send(RosterEvent::Left { peer_id, reason });
        }
        removed
    }
}

impl PeerRoster for InMemoryRoster {
    fn contains(&self, peer_id: PeerId) -> bool {
        self.players
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&peer_id)
    }

    fn display_name(&self, peer_id: PeerId) -> Option<String> {
        self.players
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&peer_id)
            .cloned()
    }

    fn disconnect(&self, peer_id: PeerId, reason: &str) -> transport::Result<()> {
        if self.remove(peer_id, Some(reason.to_string())) {
            Ok(())
        } else {
            Err(TransportError::PeerNotFound(peer_id))
        }
    }
}
