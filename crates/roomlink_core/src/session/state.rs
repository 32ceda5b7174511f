//! Session and roster state.

use super::RoomCode;
use crate::messaging::{PlayerInfo, RoomSnapshot};
use crate::types::{PlayerId, PoseSet, Zone};
use std::collections::HashMap;

/// Room membership state of the local client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Hosting,
    Joined,
}

/// A participant in the current room.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub player_id: PlayerId,
    pub display_name: String,
    pub is_host: bool,
    pub zone: Zone,
    /// Last received poses: root in world frame, head and hands root-relative
    pub poses: PoseSet,
}

impl Player {
    pub fn new(player_id: PlayerId, display_name: impl Into<String>, is_host: bool, zone: Zone) -> Self {
        Self {
            player_id,
            display_name: display_name.into(),
            is_host,
            zone,
            poses: PoseSet::default(),
        }
    }

    pub fn from_info(info: &PlayerInfo) -> Self {
        Self::new(info.player_id.clone(), info.display_name.clone(), info.is_host, info.zone)
    }

    pub fn to_info(&self) -> PlayerInfo {
        PlayerInfo {
            player_id: self.player_id.clone(),
            display_name: self.display_name.clone(),
            is_host: self.is_host,
            zone: self.zone,
        }
    }
}

/// The room the local client currently belongs to.
#[derive(Debug, Clone)]
pub struct Session {
    pub room_id: RoomCode,
    pub name: String,
    /// Zone the local participant is currently in
    pub zone: Zone,
    pub host_id: PlayerId,
    pub max_capacity: u32,
    pub roster: HashMap<PlayerId, Player>,
}

impl Session {
    /// Session seeded with the local participant as host.
    pub fn hosted(room_id: RoomCode, name: String, zone: Zone, max_capacity: u32, host: Player) -> Self {
        let host_id = host.player_id.clone();
        let mut roster = HashMap::new();
        roster.insert(host_id.clone(), host);
        Self {
            room_id,
            name,
            zone,
            host_id,
            max_capacity,
            roster,
        }
    }

    /// Session built from a server confirmation. The roster starts with only the
    /// local participant; peers are merged separately so join events fire once.
    pub fn from_snapshot(snapshot: &RoomSnapshot, local: Player) -> Self {
        let mut roster = HashMap::new();
        roster.insert(local.player_id.clone(), local);
        Self {
            room_id: snapshot.room_id.clone(),
            name: snapshot.name.clone(),
            zone: snapshot.zone,
            host_id: snapshot.host_id.clone(),
            max_capacity: snapshot.max_players,
            roster,
        }
    }

    /// Merges a server roster. Returns the players that were not known before.
    ///
    /// The host flag is derived from `host_id` so exactly one entry carries it.
    pub fn merge_roster(&mut self, players: &[PlayerInfo], local_id: &PlayerId) -> Vec<Player> {
        let mut added = Vec::new();
        for info in players {
            if !info.player_id.is_valid() || &info.player_id == local_id {
                continue;
            }
            if self.roster.contains_key(&info.player_id) {
                continue;
            }
            let mut player = Player::from_info(info);
            player.is_host = player.player_id == self.host_id;
            self.roster.insert(player.player_id.clone(), player.clone());
            added.push(player);
        }
        self.normalize_host_flags();
        added
    }

    pub fn normalize_host_flags(&mut self) {
        for player in self.roster.values_mut() {
            player.is_host = player.player_id == self.host_id;
        }
    }

    pub fn is_host(&self, id: &PlayerId) -> bool {
        &self.host_id == id
    }

    /// Roster sorted by id for stable iteration.
    pub fn players(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.roster.values().collect();
        players.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        players
    }
}
