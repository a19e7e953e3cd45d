//! modsync-daemon library: the pieces of the simulated session, exposed for testing.
//!
//! This is a thin layer over modsync-core that stands in for the game:
//! a chat channel, a player list, a profile file and the async loop that
//! drives each peer.

pub mod chat_bus;
pub mod profile;
pub mod roster;
pub mod runner;
pub mod simulation;

// Re-export key types for convenience
pub use chat_bus::ChatBus;
pub use profile::ProfileFile;
pub use roster::{InMemoryRoster, RosterEvent};
pub use runner::{NodeRunner, RunExit};
pub use simulation::{ClientSpec, SimulatedPeer, Simulation};
