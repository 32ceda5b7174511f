//! Message type definitions for client-server communication.
//!
//! Every frame on the wire is an [`Envelope`]:
//!
//! ```json
//! { "type": "room-join", "senderId": "p-17", "data": "{\"roomId\":\"K7M2QX\"}" }
//! ```
//!
//! `data` holds a second, nested JSON document. The transport only frames the
//! envelope; decoding `data` into the payload structs below is the router's job.

use crate::error::ProtocolError;
use crate::session::{RoomCode, RoomDirectoryEntry};
use crate::types::{PlayerId, PoseSet, Zone};
use serde::{Deserialize, Serialize};

/// Wire message type tags.
pub mod message_type {
    pub const WELCOME: &str = "welcome";
    pub const PEER_CONNECTED: &str = "peer-connected";
    pub const PEER_DISCONNECTED: &str = "peer-disconnected";
    pub const ROOM_CREATE: &str = "room-create";
    pub const ROOM_CREATED: &str = "room-created";
    pub const ROOM_JOIN: &str = "room-join";
    pub const ROOM_JOINED: &str = "room-joined";
    pub const ROOM_LEAVE: &str = "room-leave";
    pub const ROOM_LEFT: &str = "room-left";
    pub const ROOM_CLOSED: &str = "room-closed";
    pub const PLAYER_JOINED: &str = "player-joined";
    pub const PLAYER_LEFT: &str = "player-left";
    pub const ROOM_LIST: &str = "room-list";
    pub const ROOM_LIST_REQUEST: &str = "room-list-request";
    pub const ROOM_TELEPORT: &str = "room-teleport";
    pub const PLAYER_NAME_UPDATE: &str = "player-name-update";
    pub const VR_POSITION: &str = "vr-position";
    pub const ERROR: &str = "error";
}

/// Outer frame of every message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,

    #[serde(default)]
    pub sender_id: String,

    /// Nested serialized payload
    #[serde(default)]
    pub data: String,
}

impl Envelope {
    /// Wraps a payload, serializing it into the nested `data` string.
    pub fn wrap<T: Serialize>(
        message_type: &str,
        sender_id: &str,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        let data = serde_json::to_string(payload).map_err(|source| ProtocolError::Encode {
            message_type: message_type.to_string(),
            source,
        })?;
        Ok(Self {
            message_type: message_type.to_string(),
            sender_id: sender_id.to_string(),
            data,
        })
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Envelope)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode {
            message_type: self.message_type.clone(),
            source,
        })
    }

    /// Decodes the nested payload. An empty `data` string is read as `{}` so
    /// payload-less messages still parse into all-default structs.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let raw = if self.data.trim().is_empty() { "{}" } else { self.data.as_str() };
        serde_json::from_str(raw).map_err(|source| ProtocolError::Payload {
            message_type: self.message_type.clone(),
            source,
        })
    }
}

// ============================================================================
// Shared payload pieces
// ============================================================================

/// Roster entry as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub player_id: PlayerId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub zone: Zone,
}

/// Authoritative room state sent with `room-created` and `room-joined`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomCode,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zone: Zone,
    pub host_id: PlayerId,
    #[serde(default)]
    pub max_players: u32,
    #[serde(default)]
    pub players: Vec<PlayerInfo>,
}

// ============================================================================
// Inbound payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    pub client_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerPayload {
    pub peer_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRefPayload {
    pub room_id: RoomCode,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedPayload {
    pub room_id: RoomCode,
    pub player: PlayerInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftPayload {
    pub room_id: RoomCode,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListPayload {
    #[serde(default)]
    pub rooms: Vec<RoomDirectoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerErrorPayload {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub room_id: Option<String>,
}

// ============================================================================
// Bidirectional payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeleportPayload {
    pub room_id: RoomCode,
    pub player_id: PlayerId,
    pub zone: Zone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameUpdatePayload {
    pub player_id: PlayerId,
    pub display_name: String,
}

/// Pose packet. Root in world frame; head and hands relative to the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosePacket {
    pub player_id: PlayerId,
    pub zone: Zone,
    pub poses: PoseSet,
}

// ============================================================================
// Outbound payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub room_id: RoomCode,
    pub name: String,
    pub zone: Zone,
    pub max_players: u32,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_id: RoomCode,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoomRequest {
    pub room_id: RoomCode,
}

/// Typed view of every message the client sends.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    CreateRoom(CreateRoomRequest),
    JoinRoom(JoinRoomRequest),
    LeaveRoom(LeaveRoomRequest),
    Teleport(TeleportPayload),
    NameUpdate(NameUpdatePayload),
    RoomListRequest,
    Pose(PosePacket),
}

impl Outbound {
    pub fn message_type(&self) -> &'static str {
        match self {
            Outbound::CreateRoom(_) => message_type::ROOM_CREATE,
            Outbound::JoinRoom(_) => message_type::ROOM_JOIN,
            Outbound::LeaveRoom(_) => message_type::ROOM_LEAVE,
            Outbound::Teleport(_) => message_type::ROOM_TELEPORT,
            Outbound::NameUpdate(_) => message_type::PLAYER_NAME_UPDATE,
            Outbound::RoomListRequest => message_type::ROOM_LIST_REQUEST,
            Outbound::Pose(_) => message_type::VR_POSITION,
        }
    }

    /// Builds the envelope for this message on behalf of `sender_id`.
    pub fn to_envelope(&self, sender_id: &str) -> Result<Envelope, ProtocolError> {
        let kind = self.message_type();
        match self {
            Outbound::CreateRoom(p) => Envelope::wrap(kind, sender_id, p),
            Outbound::JoinRoom(p) => Envelope::wrap(kind, sender_id, p),
            Outbound::LeaveRoom(p) => Envelope::wrap(kind, sender_id, p),
            Outbound::Teleport(p) => Envelope::wrap(kind, sender_id, p),
            Outbound::NameUpdate(p) => Envelope::wrap(kind, sender_id, p),
            Outbound::RoomListRequest => Envelope::wrap(kind, sender_id, &serde_json::json!({})),
            Outbound::Pose(p) => Envelope::wrap(kind, sender_id, p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_uses_wire_field_names() {
        let env = Envelope::wrap(
            message_type::ROOM_LEAVE,
            "p-1",
            &LeaveRoomRequest { room_id: RoomCode::new_unchecked("K7M2QX") },
        )
        .unwrap();
        let text = env.encode().unwrap();
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(raw["type"], "room-leave");
        assert_eq!(raw["senderId"], "p-1");
        // data is itself a JSON document encoded as a string
        let nested: serde_json::Value =
            serde_json::from_str(raw["data"].as_str().unwrap()).unwrap();
        assert_eq!(nested["roomId"], "K7M2QX");
    }

    #[test]
    fn test_empty_data_decodes_as_empty_object() {
        #[derive(Deserialize)]
        struct Nothing {}

        let env = Envelope {
            message_type: message_type::ROOM_LIST_REQUEST.to_string(),
            sender_id: String::new(),
            data: String::new(),
        };
        assert!(env.payload::<Nothing>().is_ok());
    }

    #[test]
    fn test_payload_error_names_message_type() {
        let env = Envelope {
            message_type: message_type::PLAYER_LEFT.to_string(),
            sender_id: "srv".to_string(),
            data: "{\"roomId\": 5}".to_string(),
        };
        let err = env.payload::<PlayerLeftPayload>().unwrap_err();
        assert!(err.to_string().contains("player-left"));
    }
}
