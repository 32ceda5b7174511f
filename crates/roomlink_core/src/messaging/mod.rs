//! Message handling and routing for client-server communication.
//!
//! This module provides the envelope format, the typed payloads exchanged with the
//! server, and the router that demultiplexes inbound envelopes by type.

pub mod router;
pub mod types;

pub use router::{route_envelope, Inbound, MessageRouter, Subsystem};
pub use types::{message_type, Envelope, Outbound, PlayerInfo, PosePacket, RoomSnapshot};
