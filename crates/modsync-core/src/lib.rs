//! modsync-core: mod-state synchronization over a game's text chat.
//!
//! A host and its clients agree on the mod version, content bundle versions
//! and host-authoritative configuration using nothing but chat lines.
//!
//! This crate provides:
//! - The chat-line packet codec and the command payloads
//! - A `(kind, header)` dispatch table with unicast filtering
//! - Per-peer retry tracking for unanswered requests
//! - The positional config registry and its wire encoding
//! - The host/client session handshake, including admission control
//! - `ChatTransport` and `PeerRoster` trait abstractions for the game side

pub mod config;
pub mod dispatch;
mod handlers;
pub mod events;
pub mod negotiator;
pub mod node;
pub mod peer_id;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod timeout;
pub mod transport;

pub use config::{ApplyReport, ConfigEntry, ConfigError, ConfigRegistry, ConfigValue, SettingsStore, TypeTag};
pub use dispatch::{DispatchContext, DispatchOutcome, HandlerError, PacketDispatcher};
pub use events::{EventBus, SessionEvent, Subscription};
pub use negotiator::{NegotiationAction, NegotiationPhase, SessionNegotiator};
pub use node::{SyncNode, UNRESPONSIVE_KICK_REASON};
pub use peer_id::{PeerId, BROADCAST};
pub use protocol::{BundleVersions, ClientInfo, Decoded, Packet, PacketKind};
pub use session::{Role, SessionState};
pub use settings::NodeSettings;
pub use timeout::{PeerTimeoutTracker, RetryPolicy, TimeoutEvent};
pub use transport::{ChatTransport, PeerRoster, TransportError};
