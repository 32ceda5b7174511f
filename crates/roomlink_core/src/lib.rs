//! # Roomlink Core - Shared-Room Client Runtime
//!
//! Client side of a small multiplayer VR presence system. Participants connect to a
//! relay server over WebSocket, create or join short-coded rooms, and stream their
//! head, hand and body poses so everyone else sees them move.
//!
//! ## Design Philosophy
//!
//! The core contains **no rendering and no input handling**. It only provides:
//!
//! * **Transport** - Connection lifecycle, welcome handshake, reconnect scheduling
//! * **Session state machine** - Idle, hosting or joined, with an idempotent roster
//! * **Pose synchronization** - Rate limited, change filtered sampling and smooth
//!   reconstruction of remote participants
//! * **Event publishing** - Every state change is published to subscribers
//!
//! Tracking data comes in through a [`PoseSource`] and reconstructed poses go out
//! through [`PoseAnchor`]s created by a [`RigSpawner`]; the embedding application
//! supplies all three.
//!
//! ## Architecture Overview
//!
//! Everything hangs off one explicit context object, [`RoomClient`]. Socket I/O
//! runs in background tasks that only move bytes; all interpretation happens on the
//! caller's thread inside [`RoomClient::tick`], so no handler ever runs
//! concurrently with another.
//!
//! ### Message Flow
//!
//! 1. The server sends `{type, senderId, data}` envelopes with `data` holding a
//!    nested JSON document
//! 2. The transport buffers frames; `tick` drains them in arrival order
//! 3. The router decodes each payload and selects the owning subsystem
//! 4. Session and pose state are updated and events are queued
//! 5. Queued events are published at the end of the tick
//!
//! ```rust,no_run
//! use roomlink_core::{create_client, ClientEvent, Zone};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = create_client();
//! let mut events = client.subscribe();
//!
//! client.connect_to("ws://127.0.0.1:8080/ws").await?;
//! let code = client.create_room(Zone::Lobby, "Alpha")?;
//! println!("share this code: {code}");
//!
//! loop {
//!     client.tick(Duration::from_millis(16));
//!     for event in events.drain() {
//!         if let ClientEvent::PlayerJoined(player) = event {
//!             println!("{} joined", player.display_name);
//!         }
//!     }
//!     tokio::time::sleep(Duration::from_millis(16)).await;
//! }
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Failures fall into four classes (see [`error`]): transport errors arm the
//! reconnect timer, protocol errors drop the offending message, domain errors are
//! returned from collaborator calls and published as `RoomError`, and server
//! errors are published the same way. None of them end the process.

// Re-export core types and functions for easy access
pub use client::RoomClient;
pub use config::{interval_from_hz, rate_in_range, ClientConfig, PoseSyncConfig, SessionConfig, TransportConfig};
pub use error::{DomainError, ProtocolError, ServerError, TransportError};
pub use events::{ClientEvent, EventBus, Subscription, SubscriptionId};
pub use pose::{AnchorSet, LocalSpawnState, PoseAnchor, PoseSource, PoseSyncEngine, RigSpawner};
pub use session::{Player, RoomCode, RoomDirectoryEntry, SessionState};
pub use transport::{ConnectionState, Link, MemoryPeer, MessageSink};
pub use types::{PlayerId, Pose, PoseSet, Quat, TrackedElement, Vec3, Zone};
pub use utils::{create_client, create_client_with_config};

// Public module declarations
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod messaging;
pub mod pose;
pub mod session;
pub mod transport;
pub mod types;
pub mod utils;

mod tests;
