//! In-process chat channel.
//!
//! Stands in for the game's chat box: every posted line reaches every
//! subscriber, including the one that posted it. Slow subscribers lose the
//! oldest lines, just like a chat that scrolled past.

use modsync_core::transport::{self, ChatTransport, TransportError};
use tokio::sync::broadcast;
use tracing::trace;

/// Lines kept for subscribers that fall behind.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast chat shared by every simulated peer.
pub struct ChatBus {
    tx: broadcast::Sender<String>,
}

impl Default for ChatBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChatBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receive every line posted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Post an ordinary (non-protocol) chat message.
    pub fn say(&self, text: &str) -> transport::Result<()> {
        self.post(text)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn post(&self, line: &str) -> transport::Result<()> {
        trace!("chat: {}", line);
        self.tx
            .send(line.to_string())
            .map(|_| ())
            .map_err(|_| TransportError::SendFailed("nobody is listening".into()))
    }
}

impl ChatTransport for ChatBus {
    fn broadcast(&self, raw: &str) -> transport::Result<()> {
        self.post(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_sees_every_line() {
        let bus = ChatBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.broadcast("[sync]0|0>-1|hostconfig=[sync]").unwrap();
        bus.say("gg").unwrap();

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap(), "[sync]0|0>-1|hostconfig=[sync]");
            assert_eq!(rx.recv().await.unwrap(), "gg");
        }
    }

    #[test]
    fn test_send_without_listeners_fails() {
        let bus = ChatBus::default();
        assert!(matches!(
            bus.broadcast("hello"),
            Err(TransportError::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = ChatBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..4 {
            bus.say(&i.to_string()).unwrap();
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap(), "2");
    }
}
