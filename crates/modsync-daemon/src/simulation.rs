//! A host and any number of clients sharing one chat.

use crate::chat_bus::ChatBus;
use crate::profile::ProfileFile;
use crate::roster::InMemoryRoster;
use crate::runner::{NodeRunner, RunExit};
use anyhow::{Context, Result};
use modsync_core::{
    ChatTransport, ClientInfo, ConfigRegistry, EventBus, NodeSettings, PeerId, PeerRoster, Role, SyncNode,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A client to add to the session.
#[derive(Debug, Clone)]
pub struct ClientSpec {
    pub name: String,
    pub identity: ClientInfo,
    /// The client's own settings before the host's are applied
    pub registry: ConfigRegistry,
    /// Bus the client publishes on; subscribe before adding the client to
    /// see its opening requests.
    pub events: Option<Arc<EventBus>>,
}

impl ClientSpec {
    pub fn new(name: impl Into<String>, identity: ClientInfo, registry: ConfigRegistry) -> Self {
        Self {
            name: name.into(),
            identity,
            registry,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }
}

/// A running simulated peer.
pub struct SimulatedPeer {
    pub peer_id: PeerId,
    pub name: String,
    pub node: Arc<Mutex<SyncNode>>,
    task: JoinHandle<RunExit>,
}

impl SimulatedPeer {
    /// Whether the runner has stopped (for example after a kick).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct Simulation {
    chat: Arc<ChatBus>,
    roster: Arc<InMemoryRoster>,
    settings: NodeSettings,
    tick_interval: Duration,
    host: SimulatedPeer,
    clients: Vec<SimulatedPeer>,
    shutdown: watch::Sender<bool>,
}

impl Simulation {
    /// Start a host configured from `profile`. Must run inside a tokio runtime.
    pub fn start(profile: &ProfileFile, tick_interval: Duration) -> Result<Self> {
        let chat = Arc::new(ChatBus::default());
        let roster = Arc::new(InMemoryRoster::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let registry = profile.registry().context("Failed to build host registry")?;
        let node = SyncNode::new(
            PeerId::HOST,
            profile.identity(),
            registry,
            Arc::clone(&chat) as Arc<dyn ChatTransport>,
            Arc::clone(&roster) as Arc<dyn PeerRoster>,
        )
        .with_settings(profile.settings.clone());

        let runner = NodeRunner::new(node, &chat, &roster, tick_interval, Role::Host);
        let host = SimulatedPeer {
            peer_id: PeerId::HOST,
            name: "host".to_string(),
            node: runner.node(),
            task: runner.spawn(shutdown_rx),
        };
        info!("Host started running {}", profile.identity().encode());

        Ok(Self {
            chat,
            roster,
            settings: profile.settings.clone(),
            tick_interval,
            host,
            clients: Vec::new(),
            shutdown,
        })
    }

    /// Join a new client to the session.
    pub fn add_client(&mut self, spec: ClientSpec) -> PeerId {
        let peer_id = PeerId::generate();
        let mut node = SyncNode::new(
            peer_id,
            spec.identity,
            spec.registry,
            Arc::clone(&self.chat) as Arc<dyn ChatTransport>,
            Arc::clone(&self.roster) as Arc<dyn PeerRoster>,
        )
        .with_settings(self.settings.clone());
        if let Some(events) = spec.events {
            node = node.with_events(events);
        }

        let runner = NodeRunner::new(node, &self.chat, &self.roster, self.tick_interval, Role::Client);
        self.roster.join(peer_id, spec.name.clone());

        self.clients.push(SimulatedPeer {
            peer_id,
            name: spec.name,
            node: runner.node(),
            task: runner.spawn(self.shutdown.subscribe()),
        });
        peer_id
    }

    pub fn client(&self, peer_id: PeerId) -> Option<&SimulatedPeer> {
        self.clients.iter().find(|c| c.peer_id == peer_id)
    }

    pub fn host(&self) -> &SimulatedPeer {
        &self.host
    }

    pub fn clients(&self) -> &[SimulatedPeer] {
        &self.clients
    }

    pub fn chat(&self) -> &Arc<ChatBus> {
        &self.chat
    }

    pub fn roster(&self) -> &Arc<InMemoryRoster> {
        &self.roster
    }

    /// Stop every runner and collect how each one ended, host first.
    pub async fn shutdown(self) -> Vec<(PeerId, RunExit)> {
        let _ = self.shutdown.send(true);

        let mut exits = Vec::new();
        for peer in std::iter::once(self.host).chain(self.clients) {
            match peer.task.await {
                Ok(exit) => exits.push((peer.peer_id, exit)),
                Err(e) => warn!("Runner for {} failed: {}", peer.name, e),
            }
        }
        exits
    }
}
