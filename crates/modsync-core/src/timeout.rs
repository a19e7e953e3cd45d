//! Per-peer retry tracking for outstanding requests.
//!
//! Each tracked peer has at most one outstanding request. Until the peer
//! answers, the request is re-sent at a fixed interval:
//! 1. `start_timeout()` after sending a request
//! 2. `check_timeouts()` periodically; it yields the requests to re-send
//! 3. `cancel_timeout()` as soon as anything arrives from that peer
//!
//! The tracker does no I/O and reads no clock; callers pass `now_ms`.

use crate::peer_id::PeerId;
use crate::protocol::Packet;
use std::collections::HashMap;
use std::time::Duration;

/// Retry behavior for one kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between re-sends
    pub interval: Duration,
    /// Give up after this many re-sends (None = retry until answered)
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// An outstanding request awaiting any reply from `peer_id`.
#[derive(Debug, Clone)]
pub struct PeerTimeout {
    pub peer_id: PeerId,
    /// When the next re-send is due (milliseconds)
    pub deadline_ms: u64,
    pub retry_interval_ms: u64,
    /// Set once the peer has answered; a cancelled timeout never fires
    pub cancelled: bool,
    /// Re-sends performed so far
    pub attempts: u32,
    pub max_attempts: Option<u32>,
    /// Request to re-send
    pub request: Packet,
}

/// Event emitted by [`PeerTimeoutTracker::check_timeouts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutEvent {
    /// Re-send this request
    Resend {
        peer_id: PeerId,
        packet: Packet,
        attempt: u32,
    },
    /// The retry budget ran out without a reply
    Exhausted { peer_id: PeerId, attempts: u32 },
}

/// Tracks outstanding requests, keyed by the peer expected to answer.
#[derive(Debug, Default)]
pub struct PeerTimeoutTracker {
    timeouts: HashMap<PeerId, PeerTimeout>,
}

impl PeerTimeoutTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `request` until `peer_id` answers.
    ///
    /// Replaces any timeout already pending for that peer. The first re-send
    /// is due one interval after `now_ms`.
    pub fn start_timeout(&mut self, peer_id: PeerId, request: Packet, policy: RetryPolicy, now_ms: u64) {
        let interval_ms = policy.interval.as_millis() as u64;
        self.timeouts.insert(
            peer_id,
            PeerTimeout {
                peer_id,
                deadline_ms: now_ms.saturating_add(interval_ms),
                retry_interval_ms: interval_ms,
                cancelled: false,
                attempts: 0,
                max_attempts: policy.max_attempts,
                request,
            },
        );
    }

    /// Mark the peer as having answered.
    ///
    /// Returns true if a pending timeout was cancelled.
    pub fn cancel_timeout(&mut self, peer_id: PeerId) -> bool {
        match self.timeouts.get_mut(&peer_id) {
            Some(timeout) if !timeout.cancelled => {
                timeout.cancelled = true;
                true
            }
            _ => false,
        }
    }

    /// Collect due re-sends and exhausted timeouts.
    ///
    /// The cancelled flag is checked here, in the same step that produces the
    /// re-send, so a cancelled timeout can never yield another request.
    pub fn check_timeouts(&mut self, now_ms: u64) -> Vec<TimeoutEvent> {
        let mut events = Vec::new();
        let mut finished = Vec::new();

        for (peer_id, timeout) in self.timeouts.iter_mut() {
            if timeout.cancelled {
                finished.push(*peer_id);
                continue;
            }
            if now_ms < timeout.deadline_ms {
                continue;
            }
            if timeout.max_attempts.is_some_and(|max| timeout.attempts >= max) {
                events.push(TimeoutEvent::Exhausted {
                    peer_id: *peer_id,
                    attempts: timeout.attempts,
                });
                finished.push(*peer_id);
                continue;
            }

            timeout.attempts += 1;
            timeout.deadline_ms = now_ms.saturating_add(timeout.retry_interval_ms);
            events.push(TimeoutEvent::Resend {
                peer_id: *peer_id,
                packet: timeout.request.clone(),
                attempt: timeout.attempts,
            });
        }

        for peer_id in finished {
            self.timeouts.remove(&peer_id);
        }

        events
    }

    /// Whether a live (uncancelled) timeout exists for the peer.
    pub fn is_pending(&self, peer_id: PeerId) -> bool {
        self.timeouts.get(&peer_id).is_some_and(|t| !t.cancelled)
    }

    pub fn get(&self, peer_id: PeerId) -> Option<&PeerTimeout> {
        self.timeouts.get(&peer_id)
    }

    /// Number of live timeouts.
    pub fn pending_count(&self) -> usize {
        self.timeouts.values().filter(|t| !t.cancelled).count()
    }

    /// Drop every timeout (session ended).
    pub fn clear(&mut self) {
        self.timeouts.clear();
    }
}
