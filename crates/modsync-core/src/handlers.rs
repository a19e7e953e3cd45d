//! Handlers for the recognized `(kind, header)` pairs.
//!
//! Each handler checks which side of the session it runs on and who sent the
//! packet before doing anything; packets that fail those checks are dropped
//! with a debug log.

use crate::config::{apply_incoming, serialize};
use crate::dispatch::{HandlerError, PacketDispatcher};
use crate::events::SessionEvent;
use crate::node::SyncContext;
use crate::peer_id::PeerId;
use crate::protocol::headers::{CLIENT_INFO, HOST_CONFIG, HOST_WEATHERS, KICK_REASON};
use crate::protocol::{Packet, PacketKind, WeatherList};
use tracing::{debug, info, warn};

/// Dispatcher with every handler registered.
pub(crate) fn dispatcher() -> PacketDispatcher<SyncContext> {
    let mut dispatcher = PacketDispatcher::new();
    dispatcher
        .register(PacketKind::Request, CLIENT_INFO, client_info_requested)
        .register(PacketKind::Request, HOST_CONFIG, host_config_requested)
        .register(PacketKind::Request, HOST_WEATHERS, weathers_requested)
        .register(PacketKind::Data, CLIENT_INFO, client_info_received)
        .register(PacketKind::Data, HOST_CONFIG, host_config_received)
        .register(PacketKind::Data, HOST_WEATHERS, weathers_received)
        .register(PacketKind::Data, KICK_REASON, kick_reason_received);
    dispatcher
}

/// Only hosts act on packets sent by clients.
fn from_client_to_host(ctx: &SyncContext, packet: &Packet) -> bool {
    if !ctx.is_host() || packet.sender.is_host() {
        debug!(
            "Ignoring {} {} from {}: not a client-to-host packet",
            packet.kind, packet.header, packet.sender
        );
        return false;
    }
    true
}

/// Only clients act on packets sent by the host.
fn from_host_to_client(ctx: &SyncContext, packet: &Packet) -> bool {
    if ctx.is_host() || !packet.sender.is_host() {
        debug!(
            "Ignoring {} {} from {}: not a host-to-client packet",
            packet.kind, packet.header, packet.sender
        );
        return false;
    }
    true
}

fn client_info_requested(ctx: &mut SyncContext, packet: &Packet) -> Result<(), HandlerError> {
    if !from_host_to_client(ctx, packet) {
        return Ok(());
    }

    let reply = Packet::data(
        ctx.local_id(),
        PeerId::HOST.as_destination(),
        CLIENT_INFO,
        ctx.identity.encode(),
    );
    ctx.send(&reply)?;
    Ok(())
}

fn host_config_requested(ctx: &mut SyncContext, packet: &Packet) -> Result<(), HandlerError> {
    if !from_client_to_host(ctx, packet) {
        return Ok(());
    }

    // Versions are checked before any configuration is handed out.
    let peer = packet.sender;
    let request = Packet::request(PeerId::HOST, peer.as_destination(), CLIENT_INFO);
    let policy = ctx.settings.client_info_policy();
    ctx.send_tracked(peer, request, policy)?;
    Ok(())
}

fn weathers_requested(ctx: &mut SyncContext, packet: &Packet) -> Result<(), HandlerError> {
    if !from_client_to_host(ctx, packet) {
        return Ok(());
    }
    if !ctx.negotiator.weathers_ready() {
        debug!("Weathers requested by {} before they were ready", packet.sender);
        return Ok(());
    }

    let reply = Packet::data(
        PeerId::HOST,
        packet.sender.as_destination(),
        HOST_WEATHERS,
        ctx.weathers.encode(),
    );
    ctx.send(&reply)?;
    Ok(())
}

fn client_info_received(ctx: &mut SyncContext, packet: &Packet) -> Result<(), HandlerError> {
    if !from_client_to_host(ctx, packet) {
        return Ok(());
    }

    let peer = packet.sender;
    let compatibility = ctx.identity.check_body(&packet.body);

    if let Some(reason) = compatibility.kick_reason() {
        info!(
            "Rejecting {} ({}): {:?}",
            ctx.peer_name(peer),
            peer,
            compatibility
        );
        ctx.kick(peer, reason)?;
        return Ok(());
    }

    let config = serialize(&ctx.registry)?;
    let reply = Packet::data(PeerId::HOST, peer.as_destination(), HOST_CONFIG, config);
    ctx.send(&reply)?;

    info!("Admitted {} ({}) running {}", ctx.peer_name(peer), peer, packet.body);
    ctx.events.emit(SessionEvent::PeerAdmitted { peer_id: peer });
    Ok(())
}

fn host_config_received(ctx: &mut SyncContext, packet: &Packet) -> Result<(), HandlerError> {
    if !from_host_to_client(ctx, packet) {
        return Ok(());
    }

    let report = apply_incoming(&mut ctx.registry, &packet.body);
    let first = ctx.negotiator.host_config_received();
    // The poll is keyed by the host id, which dispatch never treats as a reply.
    ctx.tracker.cancel_timeout(PeerId::HOST);

    if report.is_noop() && !first {
        debug!("Host config unchanged");
        return Ok(());
    }

    info!(
        "Applied host config: {} value(s), {} changed",
        report.applied,
        report.changed.len()
    );
    if !report.restart_required.is_empty() {
        warn!("Restart required for: {}", report.restart_required.join(", "));
    }
    ctx.events.emit(SessionEvent::HostConfigApplied {
        changed: report.changed,
        restart_required: report.restart_required,
    });
    Ok(())
}

fn weathers_received(ctx: &mut SyncContext, packet: &Packet) -> Result<(), HandlerError> {
    if !from_host_to_client(ctx, packet) {
        return Ok(());
    }

    let weathers = WeatherList::parse(&packet.body);
    if weathers == ctx.weathers {
        return Ok(());
    }
    info!("Received weathers for {} level(s)", weathers.0.len());
    ctx.weathers = weathers;
    ctx.events.emit(SessionEvent::WeathersApplied {
        codes: ctx.weathers.0.clone(),
    });
    Ok(())
}

fn kick_reason_received(ctx: &mut SyncContext, packet: &Packet) -> Result<(), HandlerError> {
    if !from_host_to_client(ctx, packet) {
        return Ok(());
    }

    warn!("Host is kicking us: {}", packet.body);
    ctx.last_kick_reason = Some(packet.body.clone());
    ctx.events.emit(SessionEvent::KickReasonReceived {
        reason: packet.body.clone(),
    });
    Ok(())
}
