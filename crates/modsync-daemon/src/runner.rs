//! Async driver for one [`SyncNode`].
//!
//! Feeds chat lines and roster changes into the node and ticks its retry
//! timer. The node sits behind a mutex shared with whoever inspects it, and
//! every path locks it, so a reply and a retry are never handled at once.

use crate::chat_bus::ChatBus;
use crate::roster::{InMemoryRoster, RosterEvent};
use modsync_core::{Role, SyncNode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Why a runner stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    /// Shutdown was requested or the chat closed
    Stopped,
    /// The host disconnected this peer
    Kicked { reason: String },
}

pub struct NodeRunner {
    node: Arc<Mutex<SyncNode>>,
    chat_rx: broadcast::Receiver<String>,
    roster_rx: broadcast::Receiver<RosterEvent>,
    tick_interval: Duration,
}

impl NodeRunner {
    /// Subscribe `node` to the chat and the roster, then enter a session as `role`.
    ///
    /// Subscribing comes first so no reply to the node's opening requests is
    /// missed, even if the runner is spawned later.
    pub fn new(
        mut node: SyncNode,
        chat: &ChatBus,
        roster: &InMemoryRoster,
        tick_interval: Duration,
        role: Role,
    ) -> Self {
        let chat_rx = chat.subscribe();
        let roster_rx = roster.subscribe();

        node.begin_session();
        node.confirm_session(role);

        Self {
            node: Arc::new(Mutex::new(node)),
            chat_rx,
            roster_rx,
            tick_interval,
        }
    }

    pub fn node(&self) -> Arc<Mutex<SyncNode>> {
        Arc::clone(&self.node)
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<RunExit> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RunExit {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = self.chat_rx.recv() => match result {
                    Ok(line) => self.on_chat_line(&line).await,
                    Err(RecvError::Lagged(n)) => warn!("Chat lagged, {} line(s) lost", n),
                    Err(RecvError::Closed) => return RunExit::Stopped,
                },

                result = self.roster_rx.recv() => match result {
                    Ok(event) => {
                        if let Some(exit) = self.on_roster_event(event).await {
                            return exit;
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!("Roster lagged, {} event(s) lost", n),
                    Err(RecvError::Closed) => return RunExit::Stopped,
                },

                _ = ticker.tick() => {
                    let now_ms = started.elapsed().as_millis() as u64;
                    self.node.lock().await.tick(now_ms);
                }

                _ = shutdown.changed() => return RunExit::Stopped,
            }
        }
    }

    async fn on_chat_line(&self, line: &str) {
        let mut node = self.node.lock().await;
        if !node.process_message(line) {
            debug!("[{}] chat: {}", node.local_id(), line);
        }
    }

    async fn on_roster_event(&mut self, event: RosterEvent) -> Option<RunExit> {
        let mut node = self.node.lock().await;
        match event {
            RosterEvent::Joined { peer_id, .. } => {
                node.on_peer_joined(peer_id);
                None
            }
            RosterEvent::Left { peer_id, reason } => {
                let is_us = !node.role().is_host() && peer_id == node.local_id();
                if !is_us {
                    node.on_peer_left(peer_id);
                    return None;
                }

                // The kick reason is posted just before the disconnect.
                loop {
                    match self.chat_rx.try_recv() {
                        Ok(line) => {
                            node.process_message(&line);
                        }
                        Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }

                let reason = node
                    .last_kick_reason()
                    .map(str::to_string)
                    .or(reason)
                    .unwrap_or_else(|| "Disconnected.".to_string());
                info!("[{}] Disconnected: {}", peer_id, reason);
                node.return_to_main_menu();
                Some(RunExit::Kicked { reason })
            }
        }
    }
}
