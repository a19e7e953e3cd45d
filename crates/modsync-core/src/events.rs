//! Session events for UI indicators and downstream hooks.
//!
//! `SessionEvent` reports protocol progress (waiting for the host, config
//! applied, peer kicked, ...). `EventBus` fans events out to subscribers; the
//! one-shot completion hook subscribes to [`SessionEvent::NegotiationComplete`].

use crate::peer_id::PeerId;
use crate::session::Role;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Events emitted while a session negotiates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A protocol packet addressed to us was received.
    PacketReceived {
        kind: String,
        header: String,
        sender: PeerId,
    },
    /// A protocol packet was posted to the chat.
    PacketSent {
        kind: String,
        header: String,
        destination: i64,
    },
    /// Still waiting for the host's configuration.
    #[serde(rename_all = "camelCase")]
    WaitingForHost { attempts: u32 },
    /// The host never answered within the retry budget.
    HostUnresponsive { attempts: u32 },
    /// Host configuration was applied locally.
    #[serde(rename_all = "camelCase")]
    HostConfigApplied {
        changed: Vec<String>,
        restart_required: Vec<String>,
    },
    /// Per-level weathers were received from the host.
    WeathersApplied { codes: Vec<i32> },
    /// A peer failed admission and was disconnected.
    #[serde(rename_all = "camelCase")]
    PeerRejected { peer_id: PeerId, reason: String },
    /// A peer passed admission and was sent the configuration.
    #[serde(rename_all = "camelCase")]
    PeerAdmitted { peer_id: PeerId },
    /// The host told us why we are about to be disconnected.
    KickReasonReceived { reason: String },
    /// Back at the main menu after being kicked.
    KickedFromSession { reason: String },
    /// Negotiation finished; fires at most once per session.
    NegotiationComplete { role: Role },
}

/// Subscription handle that unsubscribes automatically when dropped.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Event bus for publishing session events to subscribers.
///
/// Wrap in `Arc` to enable subscriptions.
#[derive(Default)]
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Callback)>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(&SessionEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // try_write: Drop may run during unwinding while emit holds a read lock
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: SessionEvent) {
        // Snapshot so a callback may subscribe without deadlocking.
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
