//! # Roomlink - Shared-Room Presence Client
//!
//! Command-line client for the roomlink relay. It connects, creates or joins a room
//! by its six-character code, and streams a simulated headset so other participants
//! see it walk around. Remote participants are "rendered" into the log.
//!
//! ## Quick Start
//!
//! ```bash
//! # Connect and browse the room list
//! roomlink
//!
//! # Host a room in the first meeting area
//! roomlink --create "Design Review" --zone area-a
//!
//! # Join a friend's room
//! roomlink --join K7M2QX --name Ada
//!
//! # List open rooms and exit
//! roomlink --list
//! ```
//!
//! ## Configuration
//!
//! Settings are read from a TOML file (default: `roomlink.toml`). If the file
//! doesn't exist, a default configuration will be created. The display name given
//! with `--name` is remembered in a separate profile file.
//!
//! ## Signal Handling
//!
//! SIGINT (Ctrl+C) and SIGTERM leave the current room and close the connection
//! before exiting. A second signal exits immediately.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod profile;
mod signals;
mod simulated;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Main entry point for the roomlink client.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config = match AppConfig::load_from_file(&args.config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {e}", args.config_path.display());
            std::process::exit(1);
        }
    };

    // CLI overrides have to reach the logger before anything is logged
    let mut logging_settings = config.logging.clone();
    if let Some(level) = &args.log_level {
        logging_settings.level = level.clone();
    }
    if let Err(e) = logging::setup_logging(&logging_settings, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args, config).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export main types for potential library usage
pub use config::{ClientSettings, LoggingSettings, PoseSettings, ReconnectSettings, SessionSettings};
