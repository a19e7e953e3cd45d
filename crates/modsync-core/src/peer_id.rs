//! PeerId: identifier of a session participant on the chat channel.
//!
//! Wraps the engine's unsigned 64-bit client id. The host is always
//! addressed as peer 0, since it has no separate peer id in this scheme.

use std::fmt::{self, Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

/// Wire value of `destination` meaning "every peer in the session".
pub const BROADCAST: i64 = -1;

/// A session participant, identified by its engine client id.
///
/// # Examples
/// ```
/// use modsync_core::PeerId;
///
/// let peer: PeerId = "42".parse().unwrap();
/// assert_eq!(peer.as_u64(), 42);
/// assert!(PeerId::HOST.is_host());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(u64);

impl PeerId {
    /// The host's id on the wire.
    pub const HOST: PeerId = PeerId(0);

    /// Generate a random, non-host peer id.
    pub fn generate() -> Self {
        use rand::Rng;
        loop {
            let id: u64 = rand::rng().random();
            if id != 0 {
                return Self(id);
            }
        }
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn is_host(&self) -> bool {
        self.0 == 0
    }

    /// The signed wire form used in the `destination` field.
    ///
    /// Ids above `i64::MAX` wrap, matching how the engine casts them.
    pub fn as_destination(&self) -> i64 {
        self.0 as i64
    }

    /// Whether a packet addressed to `destination` should be handled by this peer.
    pub fn is_addressed_by(&self, destination: i64) -> bool {
        destination == BROADCAST || destination as u64 == self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl From<u64> for PeerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<PeerId> for u64 {
    fn from(peer_id: PeerId) -> u64 {
        peer_id.0
    }
}

impl serde::Serialize for PeerId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PeerId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        u64::deserialize(d).map(Self)
    }
}
