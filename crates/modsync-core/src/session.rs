//! Per-session negotiation flags.

use serde::Serialize;
use std::fmt::{self, Display, Formatter};

/// Local role in the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// Session not joined yet
    #[default]
    Undetermined,
    /// Authoritative peer; addressed as peer 0
    Host,
    Client,
}

impl Role {
    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Undetermined => "undetermined",
            Role::Host => "host",
            Role::Client => "client",
        };
        f.write_str(name)
    }
}

/// Flags describing how far the current session got.
///
/// Lives as long as a session; [`SessionState::reset`] is the single way
/// back to the initial values (returning to the main menu).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub role: Role,
    /// The engine has not confirmed the session join yet
    pub session_waiting: bool,
    /// A client is still waiting for the host's configuration
    pub host_data_waiting: bool,
    /// The one-shot completion hook already ran this session
    pub already_patched: bool,
    /// The host has weathers it may hand out
    pub weathers_ready_to_share: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            role: Role::Undetermined,
            session_waiting: true,
            host_data_waiting: true,
            already_patched: false,
            weathers_ready_to_share: false,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SessionState::new();
        assert_eq!(state.role, Role::Undetermined);
        assert!(state.session_waiting);
        assert!(state.host_data_waiting);
        assert!(!state.already_patched);
        assert!(!state.is_host());
    }

    #[test]
    fn test_reset_restores_initial_values() {
        let mut state = SessionState {
            role: Role::Host,
            session_waiting: false,
            host_data_waiting: false,
            already_patched: true,
            weathers_ready_to_share: true,
        };
        state.reset();
        assert_eq!(state, SessionState::default());
    }
}
