//! Collaborators the protocol talks through.
//!
//! Implementations:
//! - chat: the game's chat box (in-game); a tokio broadcast bus (modsync-daemon)
//! - roster: the game's player list; an in-memory map (modsync-daemon)
//!
//! Both are called from the dispatch path and must not block.

use crate::peer_id::PeerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    #[error("Disconnect failed: {0}")]
    DisconnectFailed(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// The chat channel carrying protocol lines.
///
/// Every line reaches every peer, including the sender. Inbound lines are
/// fed to [`crate::SyncNode::process_message`].
pub trait ChatTransport: Send + Sync {
    /// Post one line to the chat.
    fn broadcast(&self, raw: &str) -> Result<()>;
}

/// The session's player list.
pub trait PeerRoster: Send + Sync {
    /// Whether the peer is currently in the session.
    fn contains(&self, peer_id: PeerId) -> bool;

    /// Player name for logs, if known.
    fn display_name(&self, peer_id: PeerId) -> Option<String>;

    /// Remove the peer from the session, showing it `reason`.
    fn disconnect(&self, peer_id: PeerId, reason: &str) -> Result<()>;
}
