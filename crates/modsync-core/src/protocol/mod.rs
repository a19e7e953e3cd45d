//! Wire protocol spoken over the chat channel.
//!
//! - [`envelope`]: framing of a packet inside one chat line
//! - [`headers`]: the command names peers understand
//! - [`payload`]: typed bodies for the commands that carry structured data

pub mod envelope;
pub mod headers;
pub mod payload;

pub use envelope::{decode, encode, Decoded, EnvelopeError, Packet, PacketKind, ENVELOPE_MARKER};
pub use payload::{BundleVersions, ClientInfo, Compatibility, PayloadError, WeatherList};
