//! Room code generation and normalization.

use crate::error::DomainError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbols a room code may contain. Excludes the look-alikes 0/O and 1/I.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Every room code has exactly this many symbols.
pub const ROOM_CODE_LENGTH: usize = 6;

/// Six-symbol code identifying a room.
///
/// Codes typed by a user go through [`RoomCode::parse`]; codes received from the
/// server are taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Draws a fresh code uniformly from [`ROOM_CODE_ALPHABET`].
    ///
    /// Collisions are resolved by the server; nothing is checked locally.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..ROOM_CODE_LENGTH)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalizes user input (trim + uppercase) and validates the result.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(DomainError::InvalidCode(String::new()));
        }
        let code = Self(normalized);
        if !code.is_well_formed() {
            return Err(DomainError::InvalidCode(code.0));
        }
        Ok(code)
    }

    /// Wraps a server-provided code without validation.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn is_well_formed(&self) -> bool {
        self.0.len() == ROOM_CODE_LENGTH
            && self.0.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
