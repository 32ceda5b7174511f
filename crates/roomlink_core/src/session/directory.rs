//! Read-only cache of the rooms visible to a client that has not joined one yet.

use super::RoomCode;
use crate::types::{PlayerId, Zone};
use serde::{Deserialize, Serialize};

/// One advertised room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDirectoryEntry {
    pub room_id: RoomCode,
    pub host_id: PlayerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zone: Zone,
    #[serde(default)]
    pub player_count: u32,
    #[serde(default)]
    pub max_players: u32,
}

impl RoomDirectoryEntry {
    /// A zero capacity means the server did not advertise a limit.
    pub fn is_full(&self) -> bool {
        self.max_players > 0 && self.player_count >= self.max_players
    }
}

/// Snapshot of the server's room list.
///
/// The whole snapshot is replaced on each `room-list` broadcast. Entries are never
/// patched individually, so nothing survives past the next refresh.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    entries: Vec<RoomDirectoryEntry>,
    generation: u64,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, entries: Vec<RoomDirectoryEntry>) {
        self.entries = entries;
        self.generation += 1;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn find(&self, code: &RoomCode) -> Option<&RoomDirectoryEntry> {
        self.entries.iter().find(|e| &e.room_id == code)
    }

    pub fn entries(&self) -> &[RoomDirectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of wholesale refreshes applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
