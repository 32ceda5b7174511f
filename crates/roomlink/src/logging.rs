//! Log output for the client.
//!
//! Human-readable output by default, JSON when asked for. The websocket stack is
//! held at `warn` so frame-level chatter does not bury room events.

use crate::config::LoggingSettings;
use roomlink_core::Zone;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const QUIET_TARGETS: [&str; 2] = ["tungstenite", "tokio_tungstenite"];

/// Filter for `level` with the websocket crates capped at `warn`.
pub fn level_filter(level: &str) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    let mut filter = EnvFilter::try_new(level)?;
    for target in QUIET_TARGETS {
        filter = filter.add_directive(format!("{target}=warn").parse()?);
    }
    Ok(filter)
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. `json_format` forces
/// JSON output regardless of the config file.
pub fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(log_level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(fmt::layer()
                .json()
                .with_current_span(false)
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer()
                .with_ansi(true)
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
            )
            .try_init()?;
    }

    info!("🔧 Logging at {} ({})", log_level, if json_format || config.json_format { "json" } else { "text" });
    Ok(())
}

/// Logs who is connecting where, before the first connection attempt.
pub fn display_banner(server_url: &str, display_name: &str) {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    let zones = Zone::ALL.map(|zone| zone.to_string()).join(" / ");
    info!("🥽 roomlink v{} - shared-room presence client", version);
    info!("   🌐 server: {}", server_url);
    info!("   👤 name:   {}", display_name);
    info!("   🧭 zones:  {}", zones);
}
