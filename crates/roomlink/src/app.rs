//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that drives a [`RoomClient`] at a
//! fixed frame rate, performs the startup action requested on the command line and
//! shuts down cleanly on a termination signal.

use crate::cli::{CliArgs, StartupAction};
use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::profile::Profile;
use crate::signals::{exit_on_second_signal, wait_for_shutdown};
use crate::simulated::{LoggingRigSpawner, SimulatedHeadset};
use roomlink_core::{create_client_with_config, ClientEvent, RoomClient, Vec3, Zone};
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Whether the frame loop should keep going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Carries out the startup action as connection events arrive.
///
/// The action is re-armed on every `Connected` so a reconnect puts the client
/// back where the user asked it to be.
#[derive(Debug)]
pub struct Director {
    action: StartupAction,
    zone: Zone,
    awaiting_list: bool,
}

impl Director {
    pub fn new(action: StartupAction, zone: Zone) -> Self {
        Self {
            action,
            zone,
            awaiting_list: false,
        }
    }

    pub fn handle_event(&mut self, client: &mut RoomClient, event: ClientEvent) -> Flow {
        match event {
            ClientEvent::Connected { local_id } => {
                info!("🔗 Connected as {}", local_id);
                self.start(client);
            }
            ClientEvent::Disconnected => warn!("🔌 Disconnected from server"),
            ClientEvent::ConnectionError(reason) => warn!("⚠️ Connection error: {}", reason),
            ClientEvent::RoomCreated(code) => {
                info!("🏠 Room created - share code {} to invite others", code);
            }
            ClientEvent::RoomJoined(code) => info!("🚪 Joined room {}", code),
            ClientEvent::RoomLeft => info!("🚪 Left room"),
            ClientEvent::RoomError(reason) => warn!("❌ Room error: {}", reason),
            ClientEvent::RoomListUpdated(rooms) => {
                if self.awaiting_list {
                    self.awaiting_list = false;
                    return self.on_room_list(client, &rooms);
                }
                debug!("📋 Room list refreshed ({} rooms)", rooms.len());
            }
            ClientEvent::PlayerJoined(player) => {
                info!("👋 {} joined ({})", player.display_name, player.zone);
            }
            ClientEvent::PlayerLeft(player_id) => info!("👋 {} left", player_id),
            ClientEvent::PlayerUpdated(player) => {
                info!("✏️ {} is now known as {}", player.player_id, player.display_name);
            }
            ClientEvent::ZoneChanged { player_id, zone } => {
                info!("🧭 {} moved to {}", player_id, zone);
            }
            ClientEvent::LocalParticipantSpawned => info!("🥽 Local participant spawned"),
            ClientEvent::RemoteParticipantSpawned(player_id) => {
                debug!("🧍 Remote participant {} spawned", player_id);
            }
            ClientEvent::RemoteParticipantDespawned(player_id) => {
                debug!("🧍 Remote participant {} despawned", player_id);
            }
        }
        Flow::Continue
    }

    fn start(&mut self, client: &mut RoomClient) {
        match &self.action {
            StartupAction::Browse => {
                let _ = client.request_room_list();
            }
            StartupAction::Create { name } => {
                // Errors are already published as RoomError
                let _ = client.create_room(self.zone, name);
            }
            StartupAction::Join { .. } | StartupAction::List => {
                // Joining checks the directory, so it has to be fetched first
                if client.request_room_list().is_ok() {
                    self.awaiting_list = true;
                }
            }
        }
    }

    fn on_room_list(&mut self, client: &mut RoomClient, rooms: &[roomlink_core::RoomDirectoryEntry]) -> Flow {
        match &self.action {
            StartupAction::List => {
                if rooms.is_empty() {
                    info!("📋 No open rooms");
                }
                for room in rooms {
                    info!(
                        "📋 {} '{}' in {} - {}/{} players",
                        room.room_id, room.name, room.zone, room.player_count, room.max_players
                    );
                }
                Flow::Exit
            }
            StartupAction::Join { code } => {
                let _ = client.join_room(code);
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }
}

/// Main application struct.
///
/// Owns the configured room client together with the simulated headset and the
/// logging avatar spawner that stand in for tracking hardware and rendering.
pub struct Application {
    config: AppConfig,
    client: RoomClient,
    director: Director,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Apply command-line overrides to the loaded configuration
    /// 2. Resolve the display name (CLI, then profile, then config)
    /// 3. Validate the merged configuration
    /// 4. Display startup banner
    /// 5. Build the room client and install the simulated collaborators
    pub async fn new(args: CliArgs, mut config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(url) = args.server_url {
            config.client.server_url = url;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        let mut profile = Profile::load(&args.profile_path).await?;
        match args.display_name {
            Some(name) => {
                config.session.display_name = name.trim().to_string();
                profile.display_name = Some(config.session.display_name.clone());
                if let Err(e) = profile.save(&args.profile_path).await {
                    warn!("⚠️ Could not remember display name: {}", e);
                }
            }
            None => {
                if let Some(name) = profile.display_name() {
                    config.session.display_name = name.to_string();
                }
            }
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        } else {
            info!("✅ Configuration loaded and validated successfully");
        }

        let zone = match args.zone.as_deref() {
            Some(zone) => zone.parse::<Zone>()?,
            None => config.default_zone()?,
        };

        display_banner(&config.client.server_url, &config.session.display_name);

        let mut client = create_client_with_config(config.to_client_config());
        client.set_pose_source(Box::new(SimulatedHeadset::new(Vec3::zero(), 1.5, 0.4)));
        client.set_rig_spawner(Box::new(LoggingRigSpawner::new()));

        info!("🎯 Startup action: {:?}", args.action);

        Ok(Self {
            config,
            client,
            director: Director::new(args.action, zone),
        })
    }

    /// Runs the frame loop until a shutdown signal arrives or the startup action
    /// finishes, then leaves the room and disconnects.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Same as [`Application::run`] but stops when `shutdown` resolves.
    ///
    /// Connection attempts can block for the whole handshake timeout, so they
    /// are raced against `shutdown` as well as the frame ticks.
    pub async fn run_until<S>(mut self, shutdown: S) -> Result<(), Box<dyn std::error::Error>>
    where
        S: Future<Output = Result<(), Box<dyn std::error::Error>>>,
    {
        info!("🌟 Starting roomlink client");

        let mut events = self.client.subscribe();
        self.client.request_local_spawn();

        tokio::pin!(shutdown);

        let mut stopped = false;
        tokio::select! {
            connected = self.client.connect() => {
                if let Err(e) = connected {
                    if !self.config.reconnect.enabled {
                        return Err(e.into());
                    }
                    warn!(
                        "⚠️ Initial connection failed ({}); retrying every {} ms",
                        e, self.config.reconnect.delay_ms
                    );
                }
            }
            result = &mut shutdown => {
                result?;
                info!("🛑 Shutdown requested while connecting");
                stopped = true;
            }
        }

        let tick_interval = self.config.tick_interval();
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        if !stopped {
            info!("🛑 Press Ctrl+C to leave the room and exit");
        }

        let mut last_frame = Instant::now();
        'frames: while !stopped {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    self.client.tick(now - last_frame);
                    last_frame = now;

                    tokio::select! {
                        _ = self.client.poll_reconnect(now) => {}
                        result = &mut shutdown => {
                            result?;
                            info!("🛑 Shutdown requested during reconnect");
                            break 'frames;
                        }
                    }

                    for event in events.drain() {
                        if self.director.handle_event(&mut self.client, event) == Flow::Exit {
                            break 'frames;
                        }
                    }

                    if self.client.tick_count() % 3600 == 0 {
                        info!(
                            "📊 {} players in room | {} rooms listed | {} packets sent",
                            self.client.players().len(),
                            self.client.rooms().len(),
                            self.client.transport().sent_count()
                        );
                    }
                }
                result = &mut shutdown => {
                    result?;
                    break 'frames;
                }
            }
        }

        exit_on_second_signal();
        self.client.unsubscribe(events.id());
        self.client.shutdown().await;
        info!("✅ Roomlink client shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomlink_core::messaging::message_type;
    use roomlink_core::messaging::types::RoomListPayload;
    use roomlink_core::messaging::Envelope;
    use roomlink_core::transport::welcome_envelope;
    use roomlink_core::{
        ClientConfig, Link, MemoryPeer, PlayerId, RoomCode, RoomDirectoryEntry, SessionState,
    };
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    const FRAME: Duration = Duration::from_millis(16);

    /// Local server that never answers the websocket upgrade. With `hang_up_first`
    /// the first connection is dropped so the client falls back to reconnecting.
    async fn stalling_server(hang_up_first: bool) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            if hang_up_first {
                let _ = listener.accept().await;
            }
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("ws://{addr}/ws")
    }

    async fn slow_handshake_app(url: &str, dir: &Path) -> Application {
        let profile = dir.join("profile.toml").to_string_lossy().to_string();
        let args = CliArgs::try_parse_from(["roomlink", "--profile", profile.as_str(), "--url", url]).unwrap();
        let mut config = AppConfig::default();
        config.reconnect.enabled = true;
        config.reconnect.delay_ms = 20;
        config.reconnect.handshake_timeout_ms = 30_000;
        Application::new(args, config).await.unwrap()
    }

    async fn stop_after(delay: Duration) -> Result<(), Box<dyn std::error::Error>> {
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn connected_client() -> (RoomClient, MemoryPeer) {
        let mut config = ClientConfig::default();
        config.transport.handshake_timeout = Duration::from_millis(200);
        let mut client = create_client_with_config(config);
        let (link, peer) = Link::memory();
        peer.push(&welcome_envelope(&PlayerId::from("me")));
        client.connect_link(link).await.unwrap();
        (client, peer)
    }

    fn directory_entry(code: &str) -> RoomDirectoryEntry {
        RoomDirectoryEntry {
            room_id: RoomCode::new_unchecked(code),
            host_id: PlayerId::from("host"),
            name: "Alpha".to_string(),
            zone: Zone::Lobby,
            player_count: 1,
            max_players: 8,
        }
    }

    fn sent_types(peer: &mut MemoryPeer) -> Vec<String> {
        peer.sent().into_iter().map(|e| e.message_type).collect()
    }

    #[tokio::test]
    async fn test_create_action_runs_on_connect() {
        let (mut client, mut peer) = connected_client().await;
        let mut director = Director::new(StartupAction::Create { name: "Alpha".into() }, Zone::AreaA);

        let flow = director.handle_event(&mut client, ClientEvent::Connected { local_id: PlayerId::from("me") });
        client.tick(FRAME);

        assert_eq!(flow, Flow::Continue);
        assert_eq!(client.state(), SessionState::Hosting);
        assert!(sent_types(&mut peer).contains(&message_type::ROOM_CREATE.to_string()));
    }

    #[tokio::test]
    async fn test_join_action_waits_for_directory() {
        let (mut client, mut peer) = connected_client().await;
        let mut events = client.subscribe();
        let mut director = Director::new(StartupAction::Join { code: "k7m2qx".into() }, Zone::Lobby);

        director.handle_event(&mut client, ClientEvent::Connected { local_id: PlayerId::from("me") });
        client.tick(FRAME);
        assert!(client.session().pending_join().is_none());

        let list = Envelope::wrap(
            message_type::ROOM_LIST,
            "server",
            &RoomListPayload { rooms: vec![directory_entry("K7M2QX")] },
        )
        .unwrap();
        peer.push(&list);
        client.tick(FRAME);

        for event in events.drain() {
            director.handle_event(&mut client, event);
        }
        client.tick(FRAME);

        assert_eq!(client.session().pending_join().map(|c| c.as_str()), Some("K7M2QX"));
        assert!(sent_types(&mut peer).contains(&message_type::ROOM_JOIN.to_string()));
    }

    #[tokio::test]
    async fn test_list_action_exits_after_directory() {
        let (mut client, _peer) = connected_client().await;
        let mut director = Director::new(StartupAction::List, Zone::Lobby);

        director.handle_event(&mut client, ClientEvent::Connected { local_id: PlayerId::from("me") });
        let flow = director.handle_event(
            &mut client,
            ClientEvent::RoomListUpdated(vec![directory_entry("ABCDEF")]),
        );
        assert_eq!(flow, Flow::Exit);
    }

    #[tokio::test]
    async fn test_unsolicited_room_list_does_not_exit() {
        let (mut client, _peer) = connected_client().await;
        let mut director = Director::new(StartupAction::List, Zone::Lobby);

        let flow = director.handle_event(&mut client, ClientEvent::RoomListUpdated(Vec::new()));
        assert_eq!(flow, Flow::Continue);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_initial_connect() {
        let dir = tempdir().unwrap();
        let url = stalling_server(false).await;
        let app = slow_handshake_app(&url, dir.path()).await;

        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            app.run_until(stop_after(Duration::from_millis(200))),
        )
        .await;
        assert!(matches!(finished, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_stalled_reconnect() {
        let dir = tempdir().unwrap();
        let url = stalling_server(true).await;
        let app = slow_handshake_app(&url, dir.path()).await;

        // the first attempt fails at once, the retry 20 ms later stalls in the handshake
        let finished = tokio::time::timeout(
            Duration::from_secs(5),
            app.run_until(stop_after(Duration::from_millis(400))),
        )
        .await;
        assert!(matches!(finished, Ok(Ok(()))));
    }
}
