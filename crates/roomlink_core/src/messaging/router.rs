//! Message routing logic for dispatching server messages to client subsystems.
//!
//! The router decodes the nested payload of each [`Envelope`] according to its
//! `type` tag and hands back a typed [`Inbound`] message together with the
//! [`Subsystem`] that owns it. Decoding failures are logged and counted here and
//! never reach the caller as errors.

use super::types::*;
use crate::error::ProtocolError;
use crate::types::PlayerId;
use tracing::{debug, trace, warn};

/// Typed view of every message the client consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Welcome(WelcomePayload),
    PeerConnected(PlayerId),
    PeerDisconnected(PlayerId),
    RoomCreated(RoomSnapshot),
    RoomJoined(RoomSnapshot),
    RoomLeft(RoomRefPayload),
    RoomClosed(RoomRefPayload),
    PlayerJoined(PlayerJoinedPayload),
    PlayerLeft(PlayerLeftPayload),
    RoomList(RoomListPayload),
    Teleport(TeleportPayload),
    NameUpdate(NameUpdatePayload),
    Pose(PosePacket),
    Error(ServerErrorPayload),
}

/// Subsystem responsible for an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Transport,
    Session,
    Pose,
}

impl Inbound {
    pub fn subsystem(&self) -> Subsystem {
        match self {
            Inbound::Welcome(_) => Subsystem::Transport,
            Inbound::Pose(_) => Subsystem::Pose,
            _ => Subsystem::Session,
        }
    }
}

/// Decodes an envelope into its typed message.
///
/// Returns `Ok(None)` for message types this client does not consume.
pub fn route_envelope(envelope: &Envelope) -> Result<Option<Inbound>, ProtocolError> {
    use message_type as t;

    let inbound = match envelope.message_type.as_str() {
        t::WELCOME => Inbound::Welcome(envelope.payload()?),
        t::PEER_CONNECTED => Inbound::PeerConnected(envelope.payload::<PeerPayload>()?.peer_id),
        t::PEER_DISCONNECTED => {
            Inbound::PeerDisconnected(envelope.payload::<PeerPayload>()?.peer_id)
        }
        t::ROOM_CREATED => Inbound::RoomCreated(envelope.payload()?),
        t::ROOM_JOINED => Inbound::RoomJoined(envelope.payload()?),
        t::ROOM_LEFT => Inbound::RoomLeft(envelope.payload()?),
        t::ROOM_CLOSED => Inbound::RoomClosed(envelope.payload()?),
        t::PLAYER_JOINED => Inbound::PlayerJoined(envelope.payload()?),
        t::PLAYER_LEFT => Inbound::PlayerLeft(envelope.payload()?),
        t::ROOM_LIST => Inbound::RoomList(envelope.payload()?),
        t::ROOM_TELEPORT => Inbound::Teleport(envelope.payload()?),
        t::PLAYER_NAME_UPDATE => Inbound::NameUpdate(envelope.payload()?),
        t::VR_POSITION => {
            let packet: PosePacket = envelope.payload()?;
            if !packet.player_id.is_valid() {
                return Err(ProtocolError::MissingIdentity(envelope.message_type.clone()));
            }
            Inbound::Pose(packet)
        }
        t::ERROR => Inbound::Error(envelope.payload()?),
        _ => return Ok(None),
    };
    Ok(Some(inbound))
}

/// Stateful front of [`route_envelope`] that keeps delivery statistics.
#[derive(Debug, Default)]
pub struct MessageRouter {
    routed: u64,
    dropped: u64,
    ignored: u64,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes one envelope, preserving arrival order across calls.
    ///
    /// Malformed payloads are logged and dropped; unknown types are ignored.
    pub fn route(&mut self, envelope: &Envelope) -> Option<Inbound> {
        match route_envelope(envelope) {
            Ok(Some(inbound)) => {
                self.routed += 1;
                trace!(
                    "📨 Routed '{}' from '{}' to {:?}",
                    envelope.message_type,
                    envelope.sender_id,
                    inbound.subsystem()
                );
                Some(inbound)
            }
            Ok(None) => {
                self.ignored += 1;
                debug!("📭 Ignoring unhandled message type '{}'", envelope.message_type);
                None
            }
            Err(e) => {
                self.dropped += 1;
                warn!("⚠️ Dropping malformed message from '{}': {}", envelope.sender_id, e);
                None
            }
        }
    }

    pub fn routed_count(&self) -> u64 {
        self.routed
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    pub fn ignored_count(&self) -> u64 {
        self.ignored
    }
}
