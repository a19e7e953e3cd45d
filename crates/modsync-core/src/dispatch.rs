//! Routing of decoded packets to their handlers.
//!
//! For every packet the dispatcher:
//! 1. drops it unless it is broadcast or addressed to the local peer
//! 2. reports any non-host sender as alive, which cancels its retries
//! 3. runs the handler registered for `(kind, header)`
//!
//! Unknown kinds and headers are logged and ignored so newer peers can add
//! commands without breaking older ones. Handler failures stay local to the
//! packet that caused them.

use crate::config::ConfigError;
use crate::peer_id::PeerId;
use crate::protocol::{Packet, PacketKind, PayloadError};
use crate::transport::TransportError;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// State the dispatcher needs from whoever owns the handlers.
pub trait DispatchContext {
    /// Our own peer id, used for unicast filtering.
    fn local_id(&self) -> PeerId;

    /// Something arrived from `peer_id`; stop retrying requests to it.
    fn peer_responded(&mut self, peer_id: PeerId);
}

/// A command handler.
pub type Handler<C> = fn(&mut C, &Packet) -> Result<(), HandlerError>;

/// What happened to a dispatched packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Addressed to another peer
    NotForUs,
    Handled,
    /// `Other` or an unrecognized kind
    UnsupportedKind,
    /// No handler for this header
    UnknownHeader,
    /// The handler returned an error
    Failed,
}

/// Table of handlers keyed by `(kind, header)`.
pub struct PacketDispatcher<C> {
    routes: HashMap<(PacketKind, String), Handler<C>>,
}

impl<C> Default for PacketDispatcher<C> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }
}

impl<C: DispatchContext> PacketDispatcher<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `(kind, header)`, replacing any previous one.
    pub fn register(&mut self, kind: PacketKind, header: &str, handler: Handler<C>) -> &mut Self {
        self.routes.insert((kind, header.to_string()), handler);
        self
    }

    pub fn has_route(&self, kind: PacketKind, header: &str) -> bool {
        self.routes.contains_key(&(kind, header.to_string()))
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Route one packet.
    pub fn dispatch(&self, ctx: &mut C, packet: &Packet) -> DispatchOutcome {
        let local_id = ctx.local_id();
        if !local_id.is_addressed_by(packet.destination) {
            debug!(
                "Ignoring {} {} for peer {} (we are {})",
                packet.kind, packet.header, packet.destination, local_id
            );
            return DispatchOutcome::NotForUs;
        }

        if !packet.sender.is_host() {
            ctx.peer_responded(packet.sender);
        }

        match PacketKind::from(packet.kind.as_i32()) {
            PacketKind::Request | PacketKind::Data => {}
            PacketKind::Other => {
                info!("Unsupported packet kind Other ({})", packet.header);
                return DispatchOutcome::UnsupportedKind;
            }
            PacketKind::Unrecognized(n) => {
                info!("Unrecognized packet kind {} ({})", n, packet.header);
                return DispatchOutcome::UnsupportedKind;
            }
        }

        let Some(handler) = self.routes.get(&(packet.kind, packet.header.clone())) else {
            info!("Unrecognized {} command: {}", packet.kind, packet.header);
            return DispatchOutcome::UnknownHeader;
        };

        match handler(ctx, packet) {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                error!(
                    "Failed to handle {} {} from {}: {}",
                    packet.kind, packet.header, packet.sender, e
                );
                DispatchOutcome::Failed
            }
        }
    }
}
