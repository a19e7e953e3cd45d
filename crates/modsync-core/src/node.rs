//! SyncNode: one peer's end of the protocol.
//!
//! Owns the session state, the config registry and the retry tracker, and
//! talks to the outside world only through [`ChatTransport`] and
//! [`PeerRoster`]. Everything runs through `&mut SyncNode`, so a reply
//! cancelling a retry and the timer firing it can never interleave.
//!
//! Drive it with:
//! - [`SyncNode::process_message`] for every chat line
//! - [`SyncNode::tick`] periodically with the current time
//! - the session lifecycle calls (`begin_session`, `confirm_session`,
//!   `on_peer_joined`, `on_peer_left`, `return_to_main_menu`)

use crate::config::ConfigRegistry;
use crate::dispatch::{DispatchContext, DispatchOutcome, PacketDispatcher};
use crate::events::{EventBus, SessionEvent};
use crate::handlers;
use crate::negotiator::{NegotiationAction, NegotiationPhase, SessionNegotiator};
use crate::peer_id::{PeerId, BROADCAST};
use crate::protocol::headers::{CLIENT_INFO, HOST_CONFIG, HOST_WEATHERS, KICK_REASON};
use crate::protocol::{decode, ClientInfo, Decoded, Packet, WeatherList};
use crate::session::{Role, SessionState};
use crate::settings::NodeSettings;
use crate::timeout::{PeerTimeoutTracker, RetryPolicy, TimeoutEvent};
use crate::transport::{ChatTransport, PeerRoster, TransportError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reason given to a client that never answered `Request/clientinfo`.
pub const UNRESPONSIVE_KICK_REASON: &str = "Missing mod or not responding.";

/// State the handlers operate on.
pub struct SyncContext {
    pub(crate) peer_id: PeerId,
    pub(crate) identity: ClientInfo,
    pub(crate) settings: NodeSettings,
    pub(crate) negotiator: SessionNegotiator,
    pub(crate) registry: ConfigRegistry,
    pub(crate) tracker: PeerTimeoutTracker,
    pub(crate) weathers: WeatherList,
    pub(crate) last_kick_reason: Option<String>,
    pub(crate) now_ms: u64,
    pub(crate) chat: Arc<dyn ChatTransport>,
    pub(crate) roster: Arc<dyn PeerRoster>,
    pub(crate) events: Arc<EventBus>,
}

impl SyncContext {
    /// The id we send as: 0 while hosting, our client id otherwise.
    pub(crate) fn local_id(&self) -> PeerId {
        if self.negotiator.is_host() {
            PeerId::HOST
        } else {
            self.peer_id
        }
    }

    pub(crate) fn is_host(&self) -> bool {
        self.negotiator.is_host()
    }

    pub(crate) fn peer_name(&self, peer_id: PeerId) -> String {
        self.roster
            .display_name(peer_id)
            .unwrap_or_else(|| format!("peer {}", peer_id))
    }

    /// Post a packet to the chat.
    pub(crate) fn send(&self, packet: &Packet) -> Result<(), TransportError> {
        self.chat.broadcast(&packet.encode())?;
        info!(
            "Sent {} {} to {}",
            packet.kind, packet.header, packet.destination
        );
        self.events.emit(SessionEvent::PacketSent {
            kind: packet.kind.to_string(),
            header: packet.header.clone(),
            destination: packet.destination,
        });
        Ok(())
    }

    /// Post a request and keep re-sending it until `peer_id` answers.
    ///
    /// The retry is armed even if this first send fails.
    pub(crate) fn send_tracked(
        &mut self,
        peer_id: PeerId,
        request: Packet,
        policy: RetryPolicy,
    ) -> Result<(), TransportError> {
        let result = self.send(&request);
        self.tracker
            .start_timeout(peer_id, request, policy, self.now_ms);
        result
    }

    /// Tell a peer why, then remove it from the session.
    pub(crate) fn kick(&mut self, peer_id: PeerId, reason: &str) -> Result<(), TransportError> {
        self.tracker.cancel_timeout(peer_id);

        let notice = Packet::data(PeerId::HOST, peer_id.as_destination(), KICK_REASON, reason);
        let sent = self.send(&notice);

        if self.roster.contains(peer_id) {
            error!("Kicking {} ({}): {}", self.peer_name(peer_id), peer_id, reason);
            self.roster.disconnect(peer_id, reason)?;
        } else {
            warn!("Cannot kick {}: not in the session", peer_id);
        }

        self.events.emit(SessionEvent::PeerRejected {
            peer_id,
            reason: reason.to_string(),
        });
        sent
    }
}

impl DispatchContext for SyncContext {
    fn local_id(&self) -> PeerId {
        SyncContext::local_id(self)
    }

    fn peer_responded(&mut self, peer_id: PeerId) {
        if self.tracker.cancel_timeout(peer_id) {
            debug!("{} responded, retries stopped", peer_id);
        }
    }
}

/// One peer's protocol endpoint.
pub struct SyncNode {
    dispatcher: PacketDispatcher<SyncContext>,
    ctx: SyncContext,
}

impl SyncNode {
    /// Create a node for the peer with client id `peer_id`.
    ///
    /// `identity` is what this peer reports in `clientinfo` and, when
    /// hosting, what clients are checked against.
    pub fn new(
        peer_id: PeerId,
        identity: ClientInfo,
        registry: ConfigRegistry,
        chat: Arc<dyn ChatTransport>,
        roster: Arc<dyn PeerRoster>,
    ) -> Self {
        Self {
            dispatcher: handlers::dispatcher(),
            ctx: SyncContext {
                peer_id,
                identity,
                settings: NodeSettings::default(),
                negotiator: SessionNegotiator::new(),
                registry,
                tracker: PeerTimeoutTracker::new(),
                weathers: WeatherList::default(),
                last_kick_reason: None,
                now_ms: 0,
                chat,
                roster,
                events: Arc::new(EventBus::new()),
            },
        }
    }

    pub fn with_settings(mut self, settings: NodeSettings) -> Self {
        self.ctx.settings = settings;
        self
    }

    /// Publish events on a shared bus instead of a private one.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.ctx.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.ctx.events
    }

    pub fn local_id(&self) -> PeerId {
        self.ctx.local_id()
    }

    pub fn role(&self) -> Role {
        self.ctx.negotiator.role()
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.ctx.negotiator.phase()
    }

    pub fn is_ready(&self) -> bool {
        self.ctx.negotiator.is_ready()
    }

    pub fn session_state(&self) -> &SessionState {
        self.ctx.negotiator.state()
    }

    pub fn identity(&self) -> &ClientInfo {
        &self.ctx.identity
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.ctx.settings
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.ctx.registry
    }

    /// Mutable access for local settings reloads.
    pub fn registry_mut(&mut self) -> &mut ConfigRegistry {
        &mut self.ctx.registry
    }

    pub fn weathers(&self) -> &[i32] {
        &self.ctx.weathers.0
    }

    pub fn last_kick_reason(&self) -> Option<&str> {
        self.ctx.last_kick_reason.as_deref()
    }

    /// Whether a request to `peer_id` is still awaiting an answer.
    pub fn is_waiting_on(&self, peer_id: PeerId) -> bool {
        self.ctx.tracker.is_pending(peer_id)
    }

    pub fn pending_requests(&self) -> usize {
        self.ctx.tracker.pending_count()
    }

    /// Feed one chat line.
    ///
    /// Returns true when the line carried the protocol envelope, so the
    /// caller can hide it from the chat UI.
    pub fn process_message(&mut self, raw: &str) -> bool {
        let packet = match decode(raw) {
            Decoded::Foreign => return false,
            Decoded::Malformed(_) => return true,
            Decoded::Packet(packet) => packet,
        };

        let outcome = self.dispatcher.dispatch(&mut self.ctx, &packet);
        if outcome != DispatchOutcome::NotForUs {
            self.ctx.events.emit(SessionEvent::PacketReceived {
                kind: packet.kind.to_string(),
                header: packet.header.clone(),
                sender: packet.sender,
            });
        }

        self.advance();
        true
    }

    /// Advance the clock: re-send due requests and move negotiation along.
    pub fn tick(&mut self, now_ms: u64) {
        self.ctx.now_ms = now_ms;

        for event in self.ctx.tracker.check_timeouts(now_ms) {
            match event {
                TimeoutEvent::Resend {
                    peer_id,
                    packet,
                    attempt,
                } => self.resend(peer_id, &packet, attempt),
                TimeoutEvent::Exhausted { peer_id, attempts } => {
                    self.give_up_on(peer_id, attempts)
                }
            }
        }

        self.advance();
    }

    fn resend(&mut self, peer_id: PeerId, packet: &Packet, attempt: u32) {
        debug!(
            "Re-sending {} {} to {} (attempt {})",
            packet.kind, packet.header, peer_id, attempt
        );
        if let Err(e) = self.ctx.send(packet) {
            error!("Failed to re-send {} to {}: {}", packet.header, peer_id, e);
        }
        if peer_id.is_host() && !self.ctx.is_host() {
            self.ctx
                .events
                .emit(SessionEvent::WaitingForHost { attempts: attempt });
        }
    }

    fn give_up_on(&mut self, peer_id: PeerId, attempts: u32) {
        if peer_id.is_host() {
            warn!("Host did not answer after {} attempt(s)", attempts);
            self.ctx
                .events
                .emit(SessionEvent::HostUnresponsive { attempts });
            return;
        }

        if self.ctx.is_host() && self.ctx.settings.kick_unresponsive_peers {
            if let Err(e) = self.ctx.kick(peer_id, UNRESPONSIVE_KICK_REASON) {
                error!("Failed to kick {}: {}", peer_id, e);
            }
        } else {
            warn!("{} did not answer after {} attempt(s)", peer_id, attempts);
        }
    }

    /// Run the negotiator and carry out what it asks for.
    fn advance(&mut self) {
        let actions = self.ctx.negotiator.step(&mut self.ctx.registry);
        for action in actions {
            match action {
                NegotiationAction::RequestHostConfig => {
                    let request = Packet::request(
                        self.ctx.local_id(),
                        PeerId::HOST.as_destination(),
                        HOST_CONFIG,
                    );
                    let policy = self.ctx.settings.host_config_policy();
                    if let Err(e) = self.ctx.send_tracked(PeerId::HOST, request, policy) {
                        error!("Failed to request host config: {}", e);
                    }
                }
                NegotiationAction::AdoptedConfiguredValues { changed } => {
                    if !changed.is_empty() {
                        info!("Restored configured values: {}", changed.join(", "));
                    }
                }
                NegotiationAction::Complete { role } => {
                    self.ctx
                        .events
                        .emit(SessionEvent::NegotiationComplete { role });
                }
            }
        }
    }

    /// Entered a session scene.
    pub fn begin_session(&mut self) {
        self.ctx.tracker.clear();
        self.ctx.weathers = WeatherList::default();
        self.ctx.last_kick_reason = None;
        self.ctx.negotiator.begin_session();
    }

    /// The engine confirmed the join.
    pub fn confirm_session(&mut self, role: Role) {
        self.ctx.negotiator.confirm_session(role);
        self.advance();
    }

    /// A player joined the hosted session: ask for its versions right away.
    pub fn on_peer_joined(&mut self, peer_id: PeerId) {
        if !self.ctx.is_host() || peer_id.is_host() {
            return;
        }
        info!("{} ({}) joined", self.ctx.peer_name(peer_id), peer_id);

        let request = Packet::request(PeerId::HOST, peer_id.as_destination(), CLIENT_INFO);
        let policy = self.ctx.settings.client_info_policy();
        if let Err(e) = self.ctx.send_tracked(peer_id, request, policy) {
            error!("Failed to request client info from {}: {}", peer_id, e);
        }
    }

    pub fn on_peer_left(&mut self, peer_id: PeerId) {
        if self.ctx.tracker.cancel_timeout(peer_id) {
            debug!("{} left with a request outstanding", peer_id);
        }
    }

    /// Host: publish per-level weathers and push them to every client.
    pub fn share_weathers(&mut self, codes: Vec<i32>) {
        if !self.ctx.is_host() {
            warn!("Only the host shares weathers");
            return;
        }
        self.ctx.weathers = WeatherList(codes);
        self.ctx.negotiator.set_weathers_ready(true);

        let push = Packet::data(PeerId::HOST, BROADCAST, HOST_WEATHERS, self.ctx.weathers.encode());
        if let Err(e) = self.ctx.send(&push) {
            error!("Failed to share weathers: {}", e);
        }
    }

    /// Client: ask the host for the current weathers.
    pub fn request_weathers(&mut self) {
        if self.ctx.is_host() {
            return;
        }
        let request = Packet::request(
            self.ctx.local_id(),
            PeerId::HOST.as_destination(),
            HOST_WEATHERS,
        );
        if let Err(e) = self.ctx.send(&request) {
            error!("Failed to request weathers: {}", e);
        }
    }

    /// Back at the main menu: drop everything session-scoped.
    ///
    /// A kick reason received during the session is surfaced as
    /// [`SessionEvent::KickedFromSession`].
    pub fn return_to_main_menu(&mut self) {
        self.ctx.tracker.clear();
        self.ctx.negotiator.end_session();
        self.ctx.weathers = WeatherList::default();

        if let Some(reason) = self.ctx.last_kick_reason.take() {
            info!("Kicked from session: {}", reason);
            self.ctx
                .events
                .emit(SessionEvent::KickedFromSession { reason });
        }
    }
}
