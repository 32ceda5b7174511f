//! # Pose Synchronization
//!
//! Streams the local participant's tracked poses to the room and reconstructs
//! everyone else's.
//!
//! Outgoing samples are rate limited and change filtered before they leave. Head
//! and hands travel relative to the root so that body motion does not dirty every
//! element. Incoming packets replace the interpolation target of the sender, and
//! each tick blends the displayed pose toward it before handing world-frame poses
//! to the application's anchors. Participants in another zone stay loaded but
//! inactive.

pub mod dirty;
pub mod engine;
pub mod remote;
pub mod rig;

pub use dirty::DirtyFilter;
pub use engine::{LocalSpawnState, PoseSyncEngine};
pub use remote::RemoteParticipant;
pub use rig::{AnchorSet, PoseAnchor, PoseSource, RigSpawner};
