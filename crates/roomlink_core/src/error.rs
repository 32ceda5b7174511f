//! Error types and handling for the roomlink client core.
//!
//! Failures are grouped into the four classes the rest of the crate reasons about:
//! transport failures trigger reconnect scheduling, protocol failures drop the
//! offending message, domain failures leave state untouched and server failures are
//! surfaced the same way as domain failures. None of them terminate the process.

/// Transport-level failure. Always recoverable through reconnection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The socket could not be opened
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The socket opened but the server never completed the welcome handshake
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Connect or handshake did not finish in time
    #[error("Connection attempt timed out after {0} ms")]
    Timeout(u64),

    /// No server address has been configured or supplied
    #[error("No server URL configured")]
    MissingUrl,
}

/// Malformed or unexpected inbound data. The message is dropped and logged.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid envelope JSON: {0}")]
    Envelope(serde_json::Error),

    #[error("Invalid '{message_type}' payload: {source}")]
    Payload {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode '{message_type}' payload: {source}")]
    Encode {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Message '{0}' carries an empty sender or player id")]
    MissingIdentity(String),
}

/// Guard failure on a collaborator call. State is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("Already in a room")]
    AlreadyInRoom,

    #[error("Not connected to the server")]
    NotConnected,

    #[error("Invalid room code: '{0}'")]
    InvalidCode(String),

    #[error("Room {0} not found")]
    RoomNotFound(String),

    #[error("Room {0} is full")]
    RoomFull(String),

    #[error("Not in a room")]
    NotInRoom,

    #[error("Display name cannot be empty")]
    InvalidName,
}

/// Explicit error message sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub code: Option<String>,
    pub message: String,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "Server error [{code}]: {}", self.message),
            None => write!(f, "Server error: {}", self.message),
        }
    }
}

impl std::error::Error for ServerError {}

impl ServerError {
    /// Maps well-known server codes onto the matching domain error, so callers see a
    /// single vocabulary regardless of where a guard tripped.
    pub fn as_domain(&self, room_hint: Option<&str>) -> Option<DomainError> {
        let room = room_hint.unwrap_or_default().to_string();
        match self.code.as_deref()? {
            "ROOM_NOT_FOUND" => Some(DomainError::RoomNotFound(room)),
            "ROOM_FULL" => Some(DomainError::RoomFull(room)),
            "ALREADY_IN_ROOM" => Some(DomainError::AlreadyInRoom),
            "INVALID_CODE" => Some(DomainError::InvalidCode(room)),
            "NOT_IN_ROOM" => Some(DomainError::NotInRoom),
            _ => None,
        }
    }

    /// Codes the server answers a `room-join` with.
    pub fn is_join_rejection(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some("ROOM_NOT_FOUND" | "ROOM_FULL" | "INVALID_CODE" | "ALREADY_IN_ROOM")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_maps_known_codes() {
        let err = ServerError {
            code: Some("ROOM_FULL".to_string()),
            message: "full".to_string(),
        };
        assert_eq!(
            err.as_domain(Some("ABCDEF")),
            Some(DomainError::RoomFull("ABCDEF".to_string()))
        );

        let unknown = ServerError {
            code: Some("RATE_LIMITED".to_string()),
            message: "slow down".to_string(),
        };
        assert_eq!(unknown.as_domain(None), None);
        assert!(!unknown.is_join_rejection());
        assert!(err.is_join_rejection());
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError {
            code: Some("ROOM_FULL".to_string()),
            message: "no seats".to_string(),
        };
        assert_eq!(err.to_string(), "Server error [ROOM_FULL]: no seats");

        let bare = ServerError { code: None, message: "oops".to_string() };
        assert_eq!(bare.to_string(), "Server error: oops");
    }
}
