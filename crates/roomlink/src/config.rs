//! Configuration management for the roomlink client.
//!
//! This module handles loading, validation, and conversion of client configuration
//! from TOML files. Command-line overrides are applied by the application.

use roomlink_core::config::{MAX_RATE_HZ, MIN_RATE_HZ};
use roomlink_core::{
    interval_from_hz, rate_in_range, ClientConfig, PoseSyncConfig, SessionConfig, TransportConfig, Zone,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

fn default_server_url() -> String {
    "ws://127.0.0.1:8080/ws".to_string()
}
fn default_tick_rate_hz() -> f64 { 60.0 }
fn default_reconnect_enabled() -> bool { true }
fn default_reconnect_delay_ms() -> u64 { 3000 }
fn default_handshake_timeout_ms() -> u64 { 10_000 }
fn default_display_name() -> String { "Player".to_string() }
fn default_max_players() -> u32 { 8 }
fn default_zone() -> String { "Lobby".to_string() }
fn default_send_rate_hz() -> f64 { 30.0 }
fn default_position_threshold() -> f64 { 0.01 }
fn default_rotation_threshold_deg() -> f64 { 1.0 }
fn default_interpolation_rate() -> f64 { 10.0 }
fn default_log_level() -> String { "info".to_string() }

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub reconnect: ReconnectSettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub pose: PoseSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Server address and frame pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// WebSocket URL of the relay server
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// How often the client ticks
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_reconnect_enabled")]
    pub enabled: bool,
    #[serde(default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,
    /// Upper bound on socket open plus welcome handshake
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_display_name")]
    pub display_name: String,
    /// Capacity advertised for rooms this client creates
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    /// Zone used by `--create` when `--zone` is not given
    #[serde(default = "default_zone")]
    pub default_zone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseSettings {
    #[serde(default = "default_send_rate_hz")]
    pub send_rate_hz: f64,
    /// Meters
    #[serde(default = "default_position_threshold")]
    pub position_threshold: f64,
    #[serde(default = "default_rotation_threshold_deg")]
    pub rotation_threshold_deg: f64,
    #[serde(default = "default_interpolation_rate")]
    pub interpolation_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json_format: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            tick_rate_hz: default_tick_rate_hz(),
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: default_reconnect_enabled(),
            delay_ms: default_reconnect_delay_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            max_players: default_max_players(),
            default_zone: default_zone(),
        }
    }
}

impl Default for PoseSettings {
    fn default() -> Self {
        Self {
            send_rate_hz: default_send_rate_hz(),
            position_threshold: default_position_threshold(),
            rotation_threshold_deg: default_rotation_threshold_deg(),
            interpolation_rate: default_interpolation_rate(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("📝 Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the file settings into the client core's runtime configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            transport: TransportConfig {
                server_url: self.client.server_url.clone(),
                auto_reconnect: self.reconnect.enabled,
                reconnect_delay: Duration::from_millis(self.reconnect.delay_ms),
                handshake_timeout: Duration::from_millis(self.reconnect.handshake_timeout_ms),
            },
            session: SessionConfig {
                max_players: self.session.max_players,
                display_name: self.session.display_name.clone(),
            },
            pose: PoseSyncConfig {
                send_rate_hz: self.pose.send_rate_hz,
                position_threshold: self.pose.position_threshold,
                rotation_threshold_deg: self.pose.rotation_threshold_deg,
                interpolation_rate: self.pose.interpolation_rate,
            },
        }
    }

    /// Frame period. Never zero, even for rates that fail validation.
    pub fn tick_interval(&self) -> Duration {
        interval_from_hz(self.client.tick_rate_hz)
    }

    pub fn default_zone(&self) -> Result<Zone, String> {
        self.session.default_zone.parse()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        let url = self.client.server_url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(format!("Invalid server URL: {url} (expected ws:// or wss://)"));
        }

        if !rate_in_range(self.client.tick_rate_hz) {
            return Err(format!(
                "client.tick_rate_hz must be between {MIN_RATE_HZ} and {MAX_RATE_HZ}"
            ));
        }

        if self.reconnect.handshake_timeout_ms == 0 {
            return Err("reconnect.handshake_timeout_ms must be greater than 0".to_string());
        }

        if self.session.display_name.trim().is_empty() {
            return Err("session.display_name cannot be empty".to_string());
        }

        if self.session.max_players < 2 {
            return Err("session.max_players must be at least 2".to_string());
        }

        self.default_zone()?;

        if !rate_in_range(self.pose.send_rate_hz) {
            return Err(format!(
                "pose.send_rate_hz must be between {MIN_RATE_HZ} and {MAX_RATE_HZ}"
            ));
        }
        if self.pose.position_threshold < 0.0 || self.pose.rotation_threshold_deg < 0.0 {
            return Err("pose thresholds cannot be negative".to_string());
        }
        if !(self.pose.interpolation_rate.is_finite() && self.pose.interpolation_rate > 0.0) {
            return Err("pose.interpolation_rate must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.client.server_url, "ws://127.0.0.1:8080/ws");
        assert_eq!(config.client.tick_rate_hz, 60.0);
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.delay_ms, 3000);
        assert_eq!(config.session.max_players, 8);
        assert_eq!(config.pose.send_rate_hz, 30.0);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roomlink.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();

        assert_eq!(config.client.server_url, "ws://127.0.0.1:8080/ws");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[client]
server_url = "wss://rooms.example.net/ws"
tick_rate_hz = 90.0

[reconnect]
enabled = false
delay_ms = 500

[session]
display_name = "Ada"
default_zone = "area-b"

[pose]
send_rate_hz = 20.0

[logging]
level = "debug"
json_format = true
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.client.server_url, "wss://rooms.example.net/ws");
        assert_eq!(config.client.tick_rate_hz, 90.0);
        assert!(!config.reconnect.enabled);
        assert_eq!(config.reconnect.delay_ms, 500);
        // omitted keys fall back to defaults
        assert_eq!(config.reconnect.handshake_timeout_ms, 10_000);
        assert_eq!(config.session.display_name, "Ada");
        assert_eq!(config.default_zone(), Ok(Zone::AreaB));
        assert_eq!(config.pose.send_rate_hz, 20.0);
        assert_eq!(config.pose.interpolation_rate, 10.0);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_to_client_config_conversion() {
        let mut config = AppConfig::default();
        config.reconnect.enabled = false;
        config.reconnect.delay_ms = 1500;
        config.session.display_name = "Grace".to_string();
        config.pose.rotation_threshold_deg = 2.5;

        let client = config.to_client_config();
        assert!(!client.transport.auto_reconnect);
        assert_eq!(client.transport.reconnect_delay, Duration::from_millis(1500));
        assert_eq!(client.session.display_name, "Grace");
        assert_eq!(client.pose.rotation_threshold_deg, 2.5);
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut config = AppConfig::default();
        config.client.server_url = "http://127.0.0.1:8080".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_values() {
        let mut config = AppConfig::default();
        config.client.tick_rate_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.display_name = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.default_zone = "Basement".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pose.position_threshold = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tick_interval() {
        let mut config = AppConfig::default();
        config.client.tick_rate_hz = 50.0;
        assert_eq!(config.tick_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_extreme_rates_fail_validation() {
        let mut config = AppConfig::default();
        config.pose.send_rate_hz = 1e-30;
        assert!(config.validate().is_err());
        // building the client must still not panic
        assert_eq!(config.to_client_config().pose.send_interval(), Duration::from_secs(10));

        let mut config = AppConfig::default();
        config.client.tick_rate_hz = 1e12;
        assert!(config.validate().is_err());
        assert!(config.tick_interval() > Duration::ZERO);

        let mut config = AppConfig::default();
        config.client.tick_rate_hz = 1e-30;
        assert!(config.validate().is_err());
        assert_eq!(config.tick_interval(), Duration::from_secs(10));
    }
}
