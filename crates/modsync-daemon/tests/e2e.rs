//! End-to-end tests for modsync-daemon.
//!
//! Runs a real host and real clients over the in-process chat: the full
//! handshake, admission control and liveness.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use modsync_core::{
    BundleVersions, ChatTransport, ClientInfo, ConfigEntry, ConfigRegistry, ConfigValue, EventBus,
    NegotiationPhase, NodeSettings, PeerId, PeerRoster, Role, SessionEvent, SyncNode,
};
use modsync_daemon::{ChatBus, ClientSpec, InMemoryRoster, NodeRunner, ProfileFile, RunExit, Simulation};
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

// ============================================================================
// Helpers
// ============================================================================

const TICK: Duration = Duration::from_millis(10);
const WAIT: Duration = Duration::from_secs(5);

fn entries(speed: i32, nickname: &str) -> Vec<ConfigEntry> {
    vec![
        ConfigEntry::new("speed", speed).sync(true),
        ConfigEntry::new("nickname", nickname),
        ConfigEntry::new("hardMode", false).sync(true),
    ]
}

fn registry(speed: i32, nickname: &str) -> ConfigRegistry {
    let mut registry = ConfigRegistry::new();
    for entry in entries(speed, nickname) {
        registry.register(entry).unwrap();
    }
    registry
}

fn host_profile() -> ProfileFile {
    let mut entries = entries(5, "host");
    entries[2] = ConfigEntry::new("hardMode", true).sync(true);
    ProfileFile {
        mod_version: "1.2.0".into(),
        bundles: [("moons".to_string(), "2".to_string())].into_iter().collect(),
        entries,
        settings: NodeSettings {
            host_config_poll_interval_ms: 50,
            client_info_retry_interval_ms: 50,
            ..NodeSettings::default()
        },
    }
}

fn matching_client(name: &str) -> ClientSpec {
    let bundles: BundleVersions = [("moons", "2")].into_iter().collect();
    ClientSpec::new(name, ClientInfo::new("1.2.0", bundles), registry(1, name))
}

/// Poll until `check` passes or the wait runs out.
async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(WAIT, async {
        while !check().await {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_clients_adopt_host_config() {
    let mut sim = Simulation::start(&host_profile(), TICK).unwrap();
    let a = sim.add_client(matching_client("alice"));
    let b = sim.add_client(matching_client("bob"));

    for peer_id in [a, b] {
        let node = Arc::clone(&sim.client(peer_id).unwrap().node);
        assert!(
            wait_until(|| {
                let node = Arc::clone(&node);
                async move { node.lock().await.is_ready() }
            })
            .await,
            "client {} never finished negotiating",
            peer_id
        );

        let node = node.lock().await;
        assert_eq!(node.registry().value("speed"), Some(&ConfigValue::Int(5)));
        assert_eq!(node.registry().value("hardMode"), Some(&ConfigValue::Bool(true)));
        // Not sync-required: stays local
        assert_ne!(node.registry().value("nickname"), Some(&ConfigValue::from("host")));
        assert_eq!(node.phase(), NegotiationPhase::Ready);
    }

    assert_eq!(sim.roster().len(), 2);
    let host = sim.host().node.lock().await;
    assert!(host.is_ready());
    drop(host);

    let exits = sim.shutdown().await;
    assert!(exits.iter().all(|(_, exit)| *exit == RunExit::Stopped));
}

#[tokio::test]
async fn test_ordinary_chat_passes_through() {
    let mut sim = Simulation::start(&host_profile(), TICK).unwrap();
    let a = sim.add_client(matching_client("alice"));
    sim.chat().say("hello from a human").unwrap();
    sim.chat().say("[sync]not|really[sync]").unwrap();

    let node = Arc::clone(&sim.client(a).unwrap().node);
    assert!(
        wait_until(|| {
            let node = Arc::clone(&node);
            async move { node.lock().await.is_ready() }
        })
        .await
    );
    sim.shutdown().await;
}

#[tokio::test]
async fn test_events_subscribed_before_join_see_opening_poll() {
    let mut sim = Simulation::start(&host_profile(), TICK).unwrap();

    let events = Arc::new(EventBus::new());
    let seen = Arc::new(StdMutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let _sub = events.subscribe(move |event| {
        seen_clone.lock().unwrap().push(event.clone());
    });

    sim.add_client(matching_client("dave").with_events(events));

    // The first poll goes out while the client is being added.
    assert!(seen.lock().unwrap().iter().any(|e| matches!(
        e,
        SessionEvent::PacketSent { header, .. } if header == "hostconfig"
    )));
    sim.shutdown().await;
}

// ============================================================================
// Admission control
// ============================================================================

#[tokio::test]
async fn test_wrong_version_client_is_kicked() {
    let mut sim = Simulation::start(&host_profile(), TICK).unwrap();
    let good = sim.add_client(matching_client("alice"));

    let bundles: BundleVersions = [("moons", "2")].into_iter().collect();
    let bad = sim.add_client(ClientSpec::new(
        "mallory",
        ClientInfo::new("1.1.9", bundles),
        registry(1, "mallory"),
    ));

    let roster = Arc::clone(sim.roster());
    assert!(
        wait_until(|| {
            let roster = Arc::clone(&roster);
            async move { !roster.contains(bad) }
        })
        .await,
        "mismatched client was never disconnected"
    );

    let kicked = sim.client(bad).unwrap();
    assert!(wait_until(move || async move { kicked.is_finished() }).await);
    {
        let node = kicked.node.lock().await;
        // Never received the host's configuration
        assert_eq!(node.registry().value("speed"), Some(&ConfigValue::Int(1)));
        assert_eq!(node.role(), Role::Undetermined);
        assert_eq!(node.last_kick_reason(), None);
    }
    assert!(roster.contains(good));

    let exits = sim.shutdown().await;
    let bad_exit = exits.iter().find(|(peer, _)| *peer == bad).map(|(_, e)| e.clone());
    assert_eq!(
        bad_exit,
        Some(RunExit::Kicked {
            reason: "Wrong version.".into()
        })
    );
}

#[tokio::test]
async fn test_wrong_bundles_client_is_kicked() {
    let mut sim = Simulation::start(&host_profile(), TICK).unwrap();
    let bundles: BundleVersions = [("moons", "3")].into_iter().collect();
    let bad = sim.add_client(ClientSpec::new(
        "eve",
        ClientInfo::new("1.2.0", bundles),
        registry(1, "eve"),
    ));

    let roster = Arc::clone(sim.roster());
    assert!(
        wait_until(|| {
            let roster = Arc::clone(&roster);
            async move { !roster.contains(bad) }
        })
        .await
    );
    let kicked = sim.client(bad).unwrap();
    assert!(wait_until(move || async move { kicked.is_finished() }).await);

    let exits = sim.shutdown().await;
    assert!(exits.contains(&(
        bad,
        RunExit::Kicked {
            reason: "Wrong bundles.".into()
        }
    )));
}

// ============================================================================
// Liveness
// ============================================================================

#[tokio::test]
async fn test_client_keeps_polling_until_host_appears() {
    let chat = Arc::new(ChatBus::default());
    let roster = Arc::new(InMemoryRoster::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let settings = NodeSettings {
        host_config_poll_interval_ms: 30,
        ..NodeSettings::default()
    };

    // Count the polls the client posts while nobody answers.
    let mut spy = chat.subscribe();

    let client_id = PeerId::from(42);
    let client = SyncNode::new(
        client_id,
        ClientInfo::new("1.2.0", BundleVersions::new()),
        registry(1, "c"),
        Arc::clone(&chat) as Arc<dyn ChatTransport>,
        Arc::clone(&roster) as Arc<dyn PeerRoster>,
    )
    .with_settings(settings.clone());

    let seen = Arc::new(StdMutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let _sub = client.events().subscribe(move |event| {
        seen_clone.lock().unwrap().push(event.clone());
    });

    let runner = NodeRunner::new(client, &chat, &roster, TICK, Role::Client);
    let client_node = runner.node();
    let client_task = runner.spawn(shutdown_rx.clone());

    let mut polls = 0;
    while polls < 3 {
        let line = timeout(WAIT, spy.recv()).await.unwrap().unwrap();
        if line.contains("|hostconfig=") {
            polls += 1;
        }
    }
    assert!(!client_node.lock().await.is_ready());

    // The host shows up late.
    let host = SyncNode::new(
        PeerId::HOST,
        ClientInfo::new("1.2.0", BundleVersions::new()),
        registry(9, "h"),
        Arc::clone(&chat) as Arc<dyn ChatTransport>,
        Arc::clone(&roster) as Arc<dyn PeerRoster>,
    )
    .with_settings(settings);
    let host_task = NodeRunner::new(host, &chat, &roster, TICK, Role::Host).spawn(shutdown_rx);

    assert!(
        wait_until(|| {
            let node = Arc::clone(&client_node);
            async move { node.lock().await.is_ready() }
        })
        .await
    );
    assert_eq!(
        client_node.lock().await.registry().value("speed"),
        Some(&ConfigValue::Int(9))
    );
    assert!(!client_node.lock().await.is_waiting_on(PeerId::HOST));
    assert!(
        seen.lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, SessionEvent::WaitingForHost { .. }))
    );

    shutdown_tx.send(true).unwrap();
    assert_eq!(client_task.await.unwrap(), RunExit::Stopped);
    assert_eq!(host_task.await.unwrap(), RunExit::Stopped);
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
async fn test_simulation_from_profile_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("profile.json");
    host_profile().save(&path).unwrap();

    let profile = ProfileFile::load(&path).unwrap();
    assert_eq!(profile, host_profile());

    let mut sim = Simulation::start(&profile, TICK).unwrap();
    let spec = ClientSpec::new("carol", profile.identity(), profile.registry().unwrap());
    let peer_id = sim.add_client(spec);

    let node = Arc::clone(&sim.client(peer_id).unwrap().node);
    assert!(
        wait_until(|| {
            let node = Arc::clone(&node);
            async move { node.lock().await.is_ready() }
        })
        .await
    );
    sim.shutdown().await;
}
