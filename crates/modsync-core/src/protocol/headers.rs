//! Command names carried in the packet header.

/// Request: host asks a client for its versions. Data: the client's answer.
pub const CLIENT_INFO: &str = "clientinfo";

/// Request: client asks the host for its configuration. Data: the positional config values.
pub const HOST_CONFIG: &str = "hostconfig";

/// Request: client asks for the current per-level weathers. Data: the weather codes.
pub const HOST_WEATHERS: &str = "hostweathers";

/// Data: human-readable reason sent to a peer right before it is disconnected.
pub const KICK_REASON: &str = "kickreason";
