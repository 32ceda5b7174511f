//! Room sessions: codes, the room directory, roster state and the lifecycle
//! state machine driven by collaborator calls and server broadcasts.

pub mod directory;
pub mod manager;
pub mod room_code;
pub mod state;

pub use directory::{RoomDirectory, RoomDirectoryEntry};
pub use manager::SessionManager;
pub use room_code::{RoomCode, ROOM_CODE_ALPHABET, ROOM_CODE_LENGTH};
pub use state::{Player, Session, SessionState};
