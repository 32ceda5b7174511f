//! Room lifecycle state machine.
//!
//! Collaborator calls validate their guards first and only mutate state once the
//! request has actually been handed to the transport. Failed guards leave every
//! field untouched. Inbound handlers are idempotent, so duplicated or reordered
//! server broadcasts never raise the same event twice.

use super::{Player, RoomCode, RoomDirectory, Session, SessionState};
use crate::config::SessionConfig;
use crate::error::{DomainError, ServerError};
use crate::events::ClientEvent;
use crate::messaging::types::{
    CreateRoomRequest, JoinRoomRequest, LeaveRoomRequest, NameUpdatePayload, PlayerJoinedPayload,
    PlayerLeftPayload, RoomRefPayload, ServerErrorPayload, TeleportPayload,
};
use crate::messaging::{Inbound, Outbound, PosePacket, RoomSnapshot};
use crate::transport::MessageSink;
use crate::types::{PlayerId, Zone};
use tracing::{debug, info, warn};

/// Owns the local view of room membership.
#[derive(Debug)]
pub struct SessionManager {
    config: SessionConfig,
    state: SessionState,
    session: Option<Session>,
    /// Join requested, server confirmation outstanding
    pending_join: Option<RoomCode>,
    directory: RoomDirectory,
    display_name: String,
    events: Vec<ClientEvent>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        let display_name = config.display_name.clone();
        Self {
            config,
            state: SessionState::Idle,
            session: None,
            pending_join: None,
            directory: RoomDirectory::new(),
            display_name,
            events: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Collaborator operations
    // ------------------------------------------------------------------

    /// Creates a room with a fresh code and becomes its host immediately.
    ///
    /// A blank `name` falls back to `"Room <code>"`.
    pub fn create_room(
        &mut self,
        link: &dyn MessageSink,
        zone: Zone,
        name: &str,
    ) -> Result<RoomCode, DomainError> {
        self.ensure_not_in_room()?;
        let local_id = connected_id(link)?;

        let code = RoomCode::generate();
        let name = match name.trim() {
            "" => format!("Room {code}"),
            trimmed => trimmed.to_string(),
        };
        let request = Outbound::CreateRoom(CreateRoomRequest {
            room_id: code.clone(),
            name: name.clone(),
            zone,
            max_players: self.config.max_players,
            display_name: self.display_name.clone(),
        });
        if !link.send(&request) {
            return Err(DomainError::NotConnected);
        }

        let host = Player::new(local_id, self.display_name.clone(), true, zone);
        self.session = Some(Session::hosted(code.clone(), name.clone(), zone, self.config.max_players, host));
        self.state = SessionState::Hosting;
        info!("🏠 Hosting room {} ('{}') in {}", code, name, zone);
        self.events.push(ClientEvent::RoomCreated(code.clone()));
        Ok(code)
    }

    /// Requests to join a room by user-typed code.
    ///
    /// The session only becomes `Joined` once the server confirms with
    /// `room-joined`; until then the code is held as a pending join.
    pub fn join_room(&mut self, link: &dyn MessageSink, input: &str) -> Result<RoomCode, DomainError> {
        self.ensure_not_in_room()?;
        let code = RoomCode::parse(input)?;
        connected_id(link)?;

        match self.directory.find(&code) {
            None => return Err(DomainError::RoomNotFound(code.to_string())),
            Some(entry) if entry.is_full() => return Err(DomainError::RoomFull(code.to_string())),
            Some(_) => {}
        }

        let request = Outbound::JoinRoom(JoinRoomRequest {
            room_id: code.clone(),
            display_name: self.display_name.clone(),
        });
        if !link.send(&request) {
            return Err(DomainError::NotConnected);
        }
        info!("🚪 Requested to join room {}", code);
        self.pending_join = Some(code.clone());
        Ok(code)
    }

    /// Leaves the current room, or abandons a pending join.
    ///
    /// Local state is cleared even if the leave notice cannot be sent.
    pub fn leave_room(&mut self, link: &dyn MessageSink) -> Result<(), DomainError> {
        if self.session.is_none() {
            let code = self.pending_join.take().ok_or(DomainError::NotInRoom)?;
            info!("🚪 Abandoning pending join of {}", code);
            link.send(&Outbound::LeaveRoom(LeaveRoomRequest { room_id: code }));
            return Ok(());
        }

        let Some(session) = self.session.take() else {
            return Err(DomainError::NotInRoom);
        };
        if !link.send(&Outbound::LeaveRoom(LeaveRoomRequest {
            room_id: session.room_id.clone(),
        })) {
            warn!("⚠️ Leave notice for {} not delivered", session.room_id);
        }
        self.state = SessionState::Idle;
        info!("👋 Left room {}", session.room_id);
        self.events.push(ClientEvent::RoomLeft);
        Ok(())
    }

    pub fn request_room_list(&mut self, link: &dyn MessageSink) -> Result<(), DomainError> {
        connected_id(link)?;
        if !link.send(&Outbound::RoomListRequest) {
            return Err(DomainError::NotConnected);
        }
        debug!("📋 Requested room list");
        Ok(())
    }

    /// Moves the local participant to another zone of the current room.
    pub fn teleport_to_zone(&mut self, link: &dyn MessageSink, zone: Zone) -> Result<(), DomainError> {
        let local_id = connected_id(link)?;
        let session = self.session.as_mut().ok_or(DomainError::NotInRoom)?;
        if session.zone == zone {
            debug!("🧭 Already in {}", zone);
            return Ok(());
        }

        let request = Outbound::Teleport(TeleportPayload {
            room_id: session.room_id.clone(),
            player_id: local_id.clone(),
            zone,
        });
        if !link.send(&request) {
            return Err(DomainError::NotConnected);
        }

        session.zone = zone;
        if let Some(me) = session.roster.get_mut(&local_id) {
            me.zone = zone;
        }
        info!("🧭 Teleported to {}", zone);
        self.events.push(ClientEvent::ZoneChanged { player_id: local_id, zone });
        Ok(())
    }

    /// Changes the local display name, announcing it when inside a room.
    pub fn set_display_name(&mut self, link: &dyn MessageSink, name: &str) -> Result<(), DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidName);
        }
        self.display_name = name.to_string();

        let (Some(session), Some(local_id)) = (self.session.as_mut(), link.local_id()) else {
            return Ok(());
        };
        let Some(me) = session.roster.get_mut(local_id) else {
            return Ok(());
        };
        me.display_name = name.to_string();
        let updated = me.clone();
        link.send(&Outbound::NameUpdate(NameUpdatePayload {
            player_id: local_id.clone(),
            display_name: name.to_string(),
        }));
        self.events.push(ClientEvent::PlayerUpdated(updated));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inbound handling
    // ------------------------------------------------------------------

    /// Applies one routed server message.
    pub fn handle(&mut self, local_id: Option<&PlayerId>, inbound: &Inbound) {
        match inbound {
            Inbound::RoomCreated(snapshot) => self.on_room_created(local_id, snapshot),
            Inbound::RoomJoined(snapshot) => self.on_room_joined(local_id, snapshot),
            Inbound::RoomLeft(payload) => self.on_room_left(payload),
            Inbound::RoomClosed(payload) => self.on_room_closed(local_id, payload),
            Inbound::PlayerJoined(payload) => self.on_player_joined(local_id, payload),
            Inbound::PlayerLeft(payload) => self.on_player_left(local_id, payload),
            Inbound::PeerDisconnected(id) => self.remove_player(local_id, id),
            Inbound::PeerConnected(id) => debug!("🔗 Peer {} connected to server", id),
            Inbound::RoomList(payload) => {
                self.directory.replace(payload.rooms.clone());
                debug!("📋 Room list refreshed ({} rooms)", self.directory.len());
                self.events.push(ClientEvent::RoomListUpdated(payload.rooms.clone()));
            }
            Inbound::Teleport(payload) => self.on_teleport(local_id, payload),
            Inbound::NameUpdate(payload) => self.on_name_update(local_id, payload),
            Inbound::Pose(packet) => {
                self.record_pose(packet);
            }
            Inbound::Error(payload) => self.on_server_error(payload),
            Inbound::Welcome(_) => debug!("🤝 Ignoring repeated welcome"),
        }
    }

    fn on_room_created(&mut self, local_id: Option<&PlayerId>, snapshot: &RoomSnapshot) {
        let (Some(session), Some(local_id)) = (self.session.as_mut(), local_id) else {
            debug!("📭 Ignoring room-created for {} outside a session", snapshot.room_id);
            return;
        };
        if session.room_id != snapshot.room_id {
            debug!("📭 Ignoring room-created for foreign room {}", snapshot.room_id);
            return;
        }
        if !snapshot.name.is_empty() {
            session.name = snapshot.name.clone();
        }
        if snapshot.max_players > 0 {
            session.max_capacity = snapshot.max_players;
        }
        let added = session.merge_roster(&snapshot.players, local_id);
        debug!("✅ Server confirmed room {}", snapshot.room_id);
        for player in added {
            self.events.push(ClientEvent::PlayerJoined(player));
        }
    }

    fn on_room_joined(&mut self, local_id: Option<&PlayerId>, snapshot: &RoomSnapshot) {
        let Some(local_id) = local_id else {
            return;
        };

        if self.pending_join.as_ref() == Some(&snapshot.room_id) {
            self.pending_join = None;
            let zone = snapshot
                .players
                .iter()
                .find(|p| &p.player_id == local_id)
                .map_or(snapshot.zone, |p| p.zone);
            let me = Player::new(local_id.clone(), self.display_name.clone(), false, zone);
            let mut session = Session::from_snapshot(snapshot, me);
            session.zone = zone;
            session.normalize_host_flags();
            let added = session.merge_roster(&snapshot.players, local_id);

            info!(
                "🎉 Joined room {} ({} participants)",
                snapshot.room_id,
                session.roster.len()
            );
            self.session = Some(session);
            self.state = SessionState::Joined;
            self.events.push(ClientEvent::RoomJoined(snapshot.room_id.clone()));
            for player in added {
                self.events.push(ClientEvent::PlayerJoined(player));
            }
            return;
        }

        match self.session.as_mut() {
            Some(session) if session.room_id == snapshot.room_id => {
                for player in session.merge_roster(&snapshot.players, local_id) {
                    self.events.push(ClientEvent::PlayerJoined(player));
                }
            }
            _ => debug!("📭 Ignoring unsolicited room-joined for {}", snapshot.room_id),
        }
    }

    fn on_room_left(&mut self, payload: &RoomRefPayload) {
        if self.current_room_id() != Some(&payload.room_id) {
            debug!("📭 room-left acknowledged for {}", payload.room_id);
            return;
        }
        // server removed us without a request
        warn!(
            "🚪 Removed from room {}: {}",
            payload.room_id,
            payload.reason.as_deref().unwrap_or("no reason given")
        );
        self.reset_session();
    }

    fn on_room_closed(&mut self, local_id: Option<&PlayerId>, payload: &RoomRefPayload) {
        if self.pending_join.as_ref() == Some(&payload.room_id) {
            self.pending_join = None;
            self.events.push(ClientEvent::RoomError("host closed room".to_string()));
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.room_id != payload.room_id {
            return;
        }
        if local_id.is_some_and(|id| session.is_host(id)) {
            debug!("📭 Host ignores room-closed for own room {}", payload.room_id);
            return;
        }
        warn!("🏚️ Room {} was closed by its host", payload.room_id);
        self.events.push(ClientEvent::RoomError("host closed room".to_string()));
        self.reset_session();
    }

    fn on_player_joined(&mut self, local_id: Option<&PlayerId>, payload: &PlayerJoinedPayload) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let id = &payload.player.player_id;
        if session.room_id != payload.room_id || local_id == Some(id) || !id.is_valid() {
            return;
        }
        if session.roster.contains_key(id) {
            debug!("👥 {} already in roster", id);
            return;
        }
        let mut player = Player::from_info(&payload.player);
        player.is_host = session.is_host(id);
        session.roster.insert(id.clone(), player.clone());
        info!("👋 {} ({}) joined", player.display_name, id);
        self.events.push(ClientEvent::PlayerJoined(player));
    }

    fn on_player_left(&mut self, local_id: Option<&PlayerId>, payload: &PlayerLeftPayload) {
        if self.current_room_id() == Some(&payload.room_id) {
            self.remove_player(local_id, &payload.player_id);
        }
    }

    fn remove_player(&mut self, local_id: Option<&PlayerId>, id: &PlayerId) {
        if local_id == Some(id) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(player) = session.roster.remove(id) {
            info!("👋 {} ({}) left", player.display_name, id);
            self.events.push(ClientEvent::PlayerLeft(id.clone()));
        }
    }

    fn on_teleport(&mut self, local_id: Option<&PlayerId>, payload: &TeleportPayload) {
        // the local echo was applied when the request was sent
        if local_id == Some(&payload.player_id) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.room_id != payload.room_id {
            return;
        }
        if let Some(player) = session.roster.get_mut(&payload.player_id) {
            if player.zone != payload.zone {
                player.zone = payload.zone;
                self.events.push(ClientEvent::ZoneChanged {
                    player_id: payload.player_id.clone(),
                    zone: payload.zone,
                });
            }
        }
    }

    fn on_name_update(&mut self, local_id: Option<&PlayerId>, payload: &NameUpdatePayload) {
        if local_id == Some(&payload.player_id) {
            return;
        }
        let Some(player) = self
            .session
            .as_mut()
            .and_then(|s| s.roster.get_mut(&payload.player_id))
        else {
            return;
        };
        if player.display_name != payload.display_name {
            player.display_name = payload.display_name.clone();
            self.events.push(ClientEvent::PlayerUpdated(player.clone()));
        }
    }

    fn on_server_error(&mut self, payload: &ServerErrorPayload) {
        let err = ServerError {
            code: payload.code.clone(),
            message: payload.message.clone(),
        };
        let cancels_join = match (self.pending_join.as_ref(), payload.room_id.as_deref()) {
            (Some(pending), Some(room)) => pending.as_str().eq_ignore_ascii_case(room.trim()),
            (Some(_), None) => err.is_join_rejection(),
            (None, _) => false,
        };
        let hint = match payload.room_id.clone() {
            Some(room) => Some(room),
            None if cancels_join => self.pending_join.as_ref().map(|c| c.to_string()),
            None => None,
        };
        if cancels_join {
            self.pending_join = None;
            debug!("🚪 Pending join cancelled by server error");
        }
        warn!("⚠️ {}", err);
        let message = match err.as_domain(hint.as_deref()) {
            Some(domain) => domain.to_string(),
            None => err.to_string(),
        };
        self.events.push(ClientEvent::RoomError(message));
    }

    /// Stores the latest poses of a roster member. Returns `false` for unknown
    /// senders, whose packets must be discarded.
    pub fn record_pose(&mut self, packet: &PosePacket) -> bool {
        let Some(player) = self
            .session
            .as_mut()
            .and_then(|s| s.roster.get_mut(&packet.player_id))
        else {
            return false;
        };
        player.poses = packet.poses;
        if player.zone != packet.zone {
            player.zone = packet.zone;
            self.events.push(ClientEvent::ZoneChanged {
                player_id: packet.player_id.clone(),
                zone: packet.zone,
            });
        }
        true
    }

    /// Drops all session state after the connection went away.
    pub fn on_disconnected(&mut self) {
        self.pending_join = None;
        self.directory.clear();
        if self.session.is_some() {
            self.reset_session();
        }
    }

    fn reset_session(&mut self) {
        self.session = None;
        self.state = SessionState::Idle;
        self.events.push(ClientEvent::RoomLeft);
    }

    fn ensure_not_in_room(&self) -> Result<(), DomainError> {
        if self.session.is_some() || self.pending_join.is_some() {
            return Err(DomainError::AlreadyInRoom);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_in_room(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_room_id(&self) -> Option<&RoomCode> {
        self.session.as_ref().map(|s| &s.room_id)
    }

    pub fn pending_join(&self) -> Option<&RoomCode> {
        self.pending_join.as_ref()
    }

    pub fn players(&self) -> Vec<&Player> {
        self.session.as_ref().map(Session::players).unwrap_or_default()
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.session.as_ref().and_then(|s| s.roster.get(id))
    }

    /// Zone of the local participant; the lobby outside a room.
    pub fn local_zone(&self) -> Zone {
        self.session.as_ref().map_or(Zone::Lobby, |s| s.zone)
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }
}

fn connected_id(link: &dyn MessageSink) -> Result<PlayerId, DomainError> {
    match link.local_id() {
        Some(id) if link.is_connected() => Ok(id.clone()),
        _ => Err(DomainError::NotConnected),
    }
}
