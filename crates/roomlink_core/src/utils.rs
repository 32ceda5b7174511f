//! Factory functions for room clients.

use crate::{client::RoomClient, config::ClientConfig};

/// Creates a room client with default configuration.
///
/// ```rust
/// use roomlink_core::create_client;
///
/// let client = create_client();
/// assert!(!client.is_connected());
/// ```
pub fn create_client() -> RoomClient {
    RoomClient::new(ClientConfig::default())
}

/// Creates a room client with custom configuration.
pub fn create_client_with_config(config: ClientConfig) -> RoomClient {
    RoomClient::new(config)
}
