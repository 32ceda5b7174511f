//! Command-line interface handling for the roomlink client.
//!
//! This module provides command-line argument parsing using the `clap` builder API.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// What the client does once connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupAction {
    /// Stay connected outside any room
    Browse,
    /// Create a room; an empty name lets the client pick one
    Create { name: String },
    /// Join the room with this code
    Join { code: String },
    /// Print the room directory and exit
    List,
}

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Path to the display-name profile
    pub profile_path: PathBuf,
    /// Optional override for the server URL
    pub server_url: Option<String>,
    /// Optional display name, remembered in the profile
    pub display_name: Option<String>,
    /// Zone to create the room in
    pub zone: Option<String>,
    pub action: StartupAction,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

fn command() -> Command {
    Command::new("roomlink")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Shared-room VR presence client with a simulated headset")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("roomlink.toml"),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("FILE")
                .help("Profile file remembering the display name")
                .default_value("roomlink-profile.toml"),
        )
        .arg(
            Arg::new("url")
                .short('u')
                .long("url")
                .value_name("URL")
                .help("Server WebSocket URL (e.g., ws://127.0.0.1:8080/ws)"),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_name("NAME")
                .help("Display name shown to other participants"),
        )
        .arg(
            Arg::new("create")
                .long("create")
                .value_name("ROOM NAME")
                .num_args(0..=1)
                .default_missing_value("")
                .help("Create a room after connecting")
                .conflicts_with_all(["join", "list"]),
        )
        .arg(
            Arg::new("zone")
                .short('z')
                .long("zone")
                .value_name("ZONE")
                .help("Zone for a created room (lobby, area-a, area-b)"),
        )
        .arg(
            Arg::new("join")
                .short('j')
                .long("join")
                .value_name("CODE")
                .help("Join the room with this six-character code")
                .conflicts_with("list"),
        )
        .arg(
            Arg::new("list")
                .long("list")
                .help("Print the room list and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let action = if let Some(name) = matches.get_one::<String>("create") {
            StartupAction::Create { name: name.clone() }
        } else if let Some(code) = matches.get_one::<String>("join") {
            StartupAction::Join { code: code.clone() }
        } else if matches.get_flag("list") {
            StartupAction::List
        } else {
            StartupAction::Browse
        };

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("roomlink.toml")),
            profile_path: matches
                .get_one::<String>("profile")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("roomlink-profile.toml")),
            server_url: matches.get_one::<String>("url").cloned(),
            display_name: matches.get_one::<String>("name").cloned(),
            zone: matches.get_one::<String>("zone").cloned(),
            action,
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}
