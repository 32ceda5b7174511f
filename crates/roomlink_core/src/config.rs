//! Client configuration types and defaults.
//!
//! This module contains the runtime configuration consumed by the client core. The
//! binary crate loads a TOML file and converts it into a [`ClientConfig`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Slowest rate accepted for any periodic loop.
pub const MIN_RATE_HZ: f64 = 0.1;
/// Fastest rate accepted for any periodic loop.
pub const MAX_RATE_HZ: f64 = 1000.0;

/// Period of a loop running at `hz`, clamped to `[MIN_RATE_HZ, MAX_RATE_HZ]`.
///
/// Zero, negative and non-finite rates fall back to one second.
pub fn interval_from_hz(hz: f64) -> Duration {
    if !hz.is_finite() || hz <= 0.0 {
        return Duration::from_secs(1);
    }
    let hz = hz.clamp(MIN_RATE_HZ, MAX_RATE_HZ);
    Duration::try_from_secs_f64(1.0 / hz).unwrap_or(Duration::from_secs(1))
}

/// Whether `hz` lies inside the accepted rate range.
pub fn rate_in_range(hz: f64) -> bool {
    hz.is_finite() && (MIN_RATE_HZ..=MAX_RATE_HZ).contains(&hz)
}

/// Configuration structure for a roomlink client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    /// Socket, handshake and reconnect behaviour
    pub transport: TransportConfig,

    /// Room creation defaults
    pub session: SessionConfig,

    /// Sampling, dirty filtering and interpolation
    pub pose: PoseSyncConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Server WebSocket URL (e.g. "ws://127.0.0.1:8080/ws")
    pub server_url: String,

    /// Whether an unexpected close arms the reconnect timer
    pub auto_reconnect: bool,

    /// Delay before a reconnect attempt
    pub reconnect_delay: Duration,

    /// Upper bound on socket open plus welcome handshake
    pub handshake_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".to_string(),
            auto_reconnect: true,
            reconnect_delay: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capacity advertised when creating a room
    pub max_players: u32,

    /// Display name used until the collaborator sets one
    pub display_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            display_name: "Player".to_string(),
        }
    }
}

/// Pose synchronization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseSyncConfig {
    /// Local sampling rate in Hz
    pub send_rate_hz: f64,

    /// Minimum positional change (meters) before a sample is transmitted
    pub position_threshold: f64,

    /// Minimum angular change (degrees) before a sample is transmitted
    pub rotation_threshold_deg: f64,

    /// Blend factor per second applied to remote poses
    pub interpolation_rate: f64,
}

impl PoseSyncConfig {
    /// Sampling period derived from the send rate.
    pub fn send_interval(&self) -> Duration {
        interval_from_hz(self.send_rate_hz)
    }
}

impl Default for PoseSyncConfig {
    fn default() -> Self {
        Self {
            send_rate_hz: 30.0,
            position_threshold: 0.01,
            rotation_threshold_deg: 1.0,
            interpolation_rate: 10.0,
        }
    }
}
