//! Startup handshake state machine.
//!
//! ```text
//! WaitingForSession ──host──────────────────────────────▶ Ready
//!         └────────client──▶ WaitingForHostConfig ──────▶ Ready
//! ```
//!
//! The negotiator decides *what* should happen; the node performs the I/O.
//! Call [`SessionNegotiator::step`] after anything that may move the session
//! forward (timer tick, session confirmation, received host config) and act
//! on the returned [`NegotiationAction`]s.

use crate::config::ConfigRegistry;
use crate::session::{Role, SessionState};
use serde::Serialize;
use tracing::{debug, info};

/// Where the session handshake currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NegotiationPhase {
    WaitingForSession,
    WaitingForHostConfig,
    Ready,
}

/// Work the caller must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationAction {
    /// Send `Request/hostconfig` to the host and keep polling until it answers
    RequestHostConfig,
    /// The host reasserted its configured values (keys that changed)
    AdoptedConfiguredValues { changed: Vec<String> },
    /// Negotiation finished; run the one-shot completion hook
    Complete { role: Role },
}

/// Drives one session from join to ready.
#[derive(Debug)]
pub struct SessionNegotiator {
    state: SessionState,
    phase: NegotiationPhase,
    host_config_requested: bool,
}

impl Default for SessionNegotiator {
    fn default() -> Self {
        Self {
            state: SessionState::default(),
            phase: NegotiationPhase::WaitingForSession,
            host_config_requested: false,
        }
    }
}

impl SessionNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> NegotiationPhase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn is_host(&self) -> bool {
        self.state.is_host()
    }

    pub fn is_ready(&self) -> bool {
        self.phase == NegotiationPhase::Ready
    }

    /// Entered a session scene: start from a clean state.
    pub fn begin_session(&mut self) {
        self.reset();
        debug!("Session started, waiting for join confirmation");
    }

    /// The engine confirmed the session join with the given role.
    pub fn confirm_session(&mut self, role: Role) {
        self.state.role = role;
        self.state.session_waiting = false;
        info!("Session joined as {}", role);
    }

    /// The host's configuration arrived.
    ///
    /// Returns false if it was not being waited for (duplicate delivery).
    pub fn host_config_received(&mut self) -> bool {
        let was_waiting = self.state.host_data_waiting;
        self.state.host_data_waiting = false;
        was_waiting
    }

    pub fn set_weathers_ready(&mut self, ready: bool) {
        self.state.weathers_ready_to_share = ready;
    }

    pub fn weathers_ready(&self) -> bool {
        self.state.weathers_ready_to_share
    }

    /// Returned to the main menu: drop everything session-scoped.
    pub fn end_session(&mut self) {
        self.reset();
        debug!("Session ended");
    }

    fn reset(&mut self) {
        self.state.reset();
        self.phase = NegotiationPhase::WaitingForSession;
        self.host_config_requested = false;
    }

    /// Advance the state machine as far as it can go.
    pub fn step(&mut self, registry: &mut ConfigRegistry) -> Vec<NegotiationAction> {
        let mut actions = Vec::new();

        if self.state.session_waiting {
            return actions;
        }

        match self.state.role {
            Role::Undetermined => return actions,
            Role::Client => {
                if self.state.host_data_waiting {
                    if !self.host_config_requested {
                        self.host_config_requested = true;
                        self.phase = NegotiationPhase::WaitingForHostConfig;
                        actions.push(NegotiationAction::RequestHostConfig);
                    }
                    return actions;
                }
            }
            Role::Host => {
                if self.phase != NegotiationPhase::Ready {
                    let changed = registry.adopt_configured();
                    actions.push(NegotiationAction::AdoptedConfiguredValues { changed });
                }
            }
        }

        if self.phase != NegotiationPhase::Ready {
            info!("Negotiation complete ({})", self.state.role);
            self.phase = NegotiationPhase::Ready;
        }

        if !self.state.already_patched {
            self.state.already_patched = true;
            actions.push(NegotiationAction::Complete {
                role: self.state.role,
            });
        }

        actions
    }
}
