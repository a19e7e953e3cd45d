//! Chat-line envelope for protocol packets.
//!
//! Every packet travels as a single chat message:
//!
//! ```text
//! [sync]<kind>|<sender>><destination>|<header>=<body>[sync]
//! ```
//!
//! The chat channel also carries human messages, so anything without the
//! envelope markers is reported as [`Decoded::Foreign`] rather than an error.
//! Nothing is escaped: bodies must avoid `|`, and structured bodies use `&`
//! as their list separator.

use crate::peer_id::{PeerId, BROADCAST};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use thiserror::Error;
use tracing::warn;

/// Marker that opens and closes every protocol message.
pub const ENVELOPE_MARKER: &str = "[sync]";

const FIELD_SEPARATOR: char = '|';
const ROUTE_SEPARATOR: char = '>';
const HEADER_SEPARATOR: char = '=';

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),

    #[error("route field is missing the '>' separator: {0:?}")]
    MissingRoute(String),

    #[error("command field is missing the '=' separator: {0:?}")]
    MissingHeader(String),

    #[error("empty header")]
    EmptyHeader,

    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Packet kind, sent on the wire as its integer value.
///
/// Kinds compare and hash by that value, so `Unrecognized(1)` equals `Data`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PacketKind {
    /// Asks the receiving peer to produce a `Data` reply.
    Request,
    /// Delivers a value, either as a reply or as an unsolicited push.
    Data,
    /// Reserved.
    Other,
    /// An integer kind this version does not know about.
    Unrecognized(i32),
}

impl PacketKind {
    pub fn as_i32(&self) -> i32 {
        match self {
            PacketKind::Request => 0,
            PacketKind::Data => 1,
            PacketKind::Other => 2,
            PacketKind::Unrecognized(n) => *n,
        }
    }
}

impl PartialEq for PacketKind {
    fn eq(&self, other: &Self) -> bool {
        self.as_i32() == other.as_i32()
    }
}

impl Eq for PacketKind {}

impl Hash for PacketKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_i32().hash(state);
    }
}

impl From<i32> for PacketKind {
    fn from(n: i32) -> Self {
        match n {
            0 => PacketKind::Request,
            1 => PacketKind::Data,
            2 => PacketKind::Other,
            n => PacketKind::Unrecognized(n),
        }
    }
}

impl Display for PacketKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PacketKind::Request => f.write_str("Request"),
            PacketKind::Data => f.write_str("Data"),
            PacketKind::Other => f.write_str("Other"),
            PacketKind::Unrecognized(n) => write!(f, "Unrecognized({})", n),
        }
    }
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    /// Id of the sending peer; 0 is the host.
    pub sender: PeerId,
    /// Target peer id, or [`BROADCAST`].
    pub destination: i64,
    /// Command name. Never empty.
    pub header: String,
    /// Command-specific payload, possibly empty.
    pub body: String,
}

impl Packet {
    pub fn new(
        kind: PacketKind,
        sender: PeerId,
        destination: i64,
        header: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let header = header.into();
        debug_assert!(!header.is_empty(), "packet header must not be empty");
        Self {
            kind: PacketKind::from(kind.as_i32()),
            sender,
            destination,
            header,
            body: body.into(),
        }
    }

    pub fn request(sender: PeerId, destination: i64, header: impl Into<String>) -> Self {
        Self::new(PacketKind::Request, sender, destination, header, String::new())
    }

    pub fn data(
        sender: PeerId,
        destination: i64,
        header: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::new(PacketKind::Data, sender, destination, header, body)
    }

    pub fn is_broadcast(&self) -> bool {
        self.destination == BROADCAST
    }

    /// Render the packet as a chat line.
    pub fn encode(&self) -> String {
        encode(self)
    }
}

/// Result of inspecting one chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Not protocol traffic (ordinary chat).
    Foreign,
    /// Wrapped in the envelope but not decodable.
    Malformed(EnvelopeError),
    Packet(Packet),
}

impl Decoded {
    /// True when the line carried the protocol envelope, valid or not.
    ///
    /// Chat UIs use this to hide protocol traffic from players.
    pub fn matched(&self) -> bool {
        !matches!(self, Decoded::Foreign)
    }

    pub fn into_packet(self) -> Option<Packet> {
        match self {
            Decoded::Packet(packet) => Some(packet),
            _ => None,
        }
    }
}

/// Encode a packet into its chat line.
pub fn encode(packet: &Packet) -> String {
    debug_assert!(!packet.header.is_empty(), "packet header must not be empty");
    format!(
        "{marker}{kind}{fs}{sender}{rs}{destination}{fs}{header}{hs}{body}{marker}",
        marker = ENVELOPE_MARKER,
        kind = packet.kind.as_i32(),
        sender = packet.sender,
        destination = packet.destination,
        header = packet.header,
        body = packet.body,
        fs = FIELD_SEPARATOR,
        rs = ROUTE_SEPARATOR,
        hs = HEADER_SEPARATOR,
    )
}

/// Strip the envelope markers, returning the inner content.
///
/// Returns `None` for chat lines that are not protocol traffic. A line break
/// inside the content also disqualifies it; the chat never splits a packet.
pub fn unwrap_envelope(raw: &str) -> Option<&str> {
    if raw.len() < ENVELOPE_MARKER.len() * 2 {
        return None;
    }
    let inner = raw
        .strip_prefix(ENVELOPE_MARKER)?
        .strip_suffix(ENVELOPE_MARKER)?;
    if inner.contains('\n') {
        return None;
    }
    Some(inner)
}

/// Decode a chat line.
///
/// Never panics and never returns an error for foreign traffic; malformed
/// protocol traffic is logged and reported as [`Decoded::Malformed`].
pub fn decode(raw: &str) -> Decoded {
    let Some(content) = unwrap_envelope(raw) else {
        return Decoded::Foreign;
    };

    match parse_content(content) {
        Ok(packet) => Decoded::Packet(packet),
        Err(e) => {
            warn!("Dropping malformed protocol message {:?}: {}", raw, e);
            Decoded::Malformed(e)
        }
    }
}

fn parse_content(content: &str) -> Result<Packet, EnvelopeError> {
    let parts: Vec<&str> = content.split(FIELD_SEPARATOR).collect();
    let [kind, route, command] = parts.as_slice() else {
        return Err(EnvelopeError::FieldCount(parts.len()));
    };

    let kind = parse_number::<i32>("kind", kind)?;

    let (sender, destination) = route
        .split_once(ROUTE_SEPARATOR)
        .ok_or_else(|| EnvelopeError::MissingRoute(route.to_string()))?;
    let sender = parse_number::<u64>("sender", sender)?;
    let destination = parse_number::<i64>("destination", destination)?;

    let (header, body) = command
        .split_once(HEADER_SEPARATOR)
        .ok_or_else(|| EnvelopeError::MissingHeader(command.to_string()))?;
    if header.is_empty() {
        return Err(EnvelopeError::EmptyHeader);
    }

    Ok(Packet {
        kind: PacketKind::from(kind),
        sender: PeerId::from(sender),
        destination,
        header: header.to_string(),
        body: body.to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, EnvelopeError> {
    value
        .trim()
        .parse()
        .map_err(|_| EnvelopeError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}
