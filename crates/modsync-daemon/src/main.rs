//! modsync-daemon: runs a host and simulated clients over an in-process chat.
//!
//! Uses the same modsync-core as the in-game mod, with a tokio broadcast
//! channel in place of the game chat.

use anyhow::{anyhow, Result};
use clap::Parser;
use modsync_core::{BundleVersions, ClientInfo, EventBus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use modsync_daemon::{ClientSpec, ProfileFile, RunExit, Simulation};

#[derive(Parser, Debug)]
#[command(name = "modsync-daemon")]
#[command(about = "Simulated mod-state sync session")]
struct Args {
    /// Path to the profile file (created with defaults if missing)
    #[arg(short, long, default_value = "modsync-profile.json")]
    profile: PathBuf,

    /// Number of clients to join
    #[arg(short, long, default_value_t = 2)]
    clients: usize,

    /// Mod version the clients report (defaults to the host's)
    #[arg(long)]
    client_version: Option<String>,

    /// Bundle the clients report, as name=version (repeatable; defaults to the host's)
    #[arg(long = "client-bundle", value_parser = parse_bundle)]
    client_bundles: Vec<(String, String)>,

    /// Retry timer resolution in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Stop after this many milliseconds (runs until Ctrl+C if omitted)
    #[arg(long)]
    run_for_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

fn parse_bundle(raw: &str) -> Result<(String, String)> {
    let (name, version) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected name=version, got {:?}", raw))?;
    if name.is_empty() || version.is_empty() {
        return Err(anyhow!("expected name=version, got {:?}", raw));
    }
    Ok((name.to_string(), version.to_string()))
}

fn client_identity(args: &Args, profile: &ProfileFile) -> ClientInfo {
    let host = profile.identity();
    let version = args.client_version.clone().unwrap_or(host.mod_version);
    let bundles = if args.client_bundles.is_empty() {
        host.bundles
    } else {
        args.client_bundles.iter().cloned().collect::<BundleVersions>()
    };
    ClientInfo::new(version, bundles)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging - respects RUST_LOG env var, defaults to info (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,modsync_core=debug,modsync_daemon=debug"
    } else {
        "info,modsync_core=info,modsync_daemon=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting modsync-daemon");
    info!("Profile path: {:?}", args.profile);

    let profile = ProfileFile::load(&args.profile)?;
    let tick = Duration::from_millis(args.tick_ms.max(1));
    let mut sim = Simulation::start(&profile, tick)?;

    let identity = client_identity(&args, &profile);
    let mut subscriptions = Vec::new();
    for i in 0..args.clients {
        let name = format!("client-{}", i + 1);
        let events = Arc::new(EventBus::new());
        let label = name.clone();
        subscriptions.push(events.subscribe(move |event| {
            match serde_json::to_string(event) {
                Ok(json) => info!("[{}] {}", label, json),
                Err(e) => warn!("[{}] unserializable event: {}", label, e),
            }
        }));

        let spec = ClientSpec::new(name, identity.clone(), profile.registry()?).with_events(events);
        sim.add_client(spec);
    }

    info!("Session running with {} client(s). Press Ctrl+C to stop.", args.clients);

    match args.run_for_ms {
        Some(ms) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received");
        }
    }

    for client in sim.clients() {
        let node = client.node.lock().await;
        info!(
            "{} ({}): phase={:?} waiting_on_host={}",
            client.name,
            client.peer_id,
            node.phase(),
            node.session_state().host_data_waiting
        );
    }

    drop(subscriptions);
    info!("Shutting down");
    for (peer_id, exit) in sim.shutdown().await {
        if let RunExit::Kicked { reason } = exit {
            info!("{} was kicked: {}", peer_id, reason);
        }
    }
    Ok(())
}
