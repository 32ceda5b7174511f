//! # Room Client
//!
//! [`RoomClient`] is the single explicit context object of the crate. It owns the
//! transport, router, session manager, pose engine and event bus, and is passed by
//! `&mut` to whatever drives the application loop.
//!
//! ## Tick Order
//!
//! 1. Drain inbound frames in arrival order and dispatch each to its subsystem
//! 2. Translate connection changes into session resets and public events
//! 3. Finish an in-flight local spawn
//! 4. Sample and send the local pose (only inside a room)
//! 5. Interpolate remote participants
//! 6. Publish every event raised during the tick

use crate::config::ClientConfig;
use crate::error::{DomainError, TransportError};
use crate::events::{ClientEvent, EventBus, Subscription, SubscriptionId};
use crate::messaging::{Envelope, Inbound, MessageRouter, Outbound, Subsystem};
use crate::pose::{PoseSource, PoseSyncEngine, RigSpawner};
use crate::session::{Player, RoomCode, RoomDirectoryEntry, SessionManager, SessionState};
use crate::transport::{Link, MessageSink, Transport, TransportEvent};
use crate::types::{PlayerId, Zone};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Client-side context for one connection to a relay server.
#[derive(Debug)]
pub struct RoomClient {
    config: ClientConfig,
    transport: Transport,
    router: MessageRouter,
    session: SessionManager,
    pose: PoseSyncEngine,
    bus: EventBus,
    pending: Vec<ClientEvent>,
    ticks: u64,
}

impl RoomClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            transport: Transport::new(config.transport.clone()),
            router: MessageRouter::new(),
            session: SessionManager::new(config.session.clone()),
            pose: PoseSyncEngine::new(config.pose.clone()),
            bus: EventBus::new(),
            pending: Vec::new(),
            ticks: 0,
            config,
        }
    }

    // ------------------------------------------------------------------
    // Subscriptions and collaborators
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self) -> Subscription {
        self.bus.subscribe()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn set_pose_source(&mut self, source: Box<dyn PoseSource>) {
        self.pose.set_pose_source(source);
    }

    pub fn set_rig_spawner(&mut self, spawner: Box<dyn RigSpawner>) {
        self.pose.set_rig_spawner(spawner);
    }

    /// Requests the local representation at application start. Collapses with the
    /// request made on room entry.
    pub fn request_local_spawn(&mut self) -> bool {
        self.pose.request_local_spawn()
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    /// Connects to the configured server URL.
    pub async fn connect(&mut self) -> Result<PlayerId, TransportError> {
        let url = self.config.transport.server_url.clone();
        self.connect_to(&url).await
    }

    pub async fn connect_to(&mut self, url: &str) -> Result<PlayerId, TransportError> {
        let result = self.transport.connect(url).await;
        self.flush();
        result
    }

    /// Connects over an already established link.
    pub async fn connect_link(&mut self, link: Link) -> Result<PlayerId, TransportError> {
        let result = self.transport.connect_link(link).await;
        self.flush();
        result
    }

    pub async fn disconnect(&mut self) {
        self.transport.disconnect().await;
        self.flush();
    }

    /// Runs a due reconnect attempt. Returns `true` if one was made.
    pub async fn poll_reconnect(&mut self, now: Instant) -> bool {
        if !self.transport.reconnect_due(now) {
            return false;
        }
        info!("🔄 Attempting reconnect");
        if let Err(e) = self.transport.reconnect().await {
            debug!("🔄 Reconnect attempt failed: {}", e);
        }
        self.flush();
        true
    }

    /// Leaves any room, closes the connection and drops every subscription.
    pub async fn shutdown(&mut self) {
        if self.session.is_in_room() || self.session.pending_join().is_some() {
            let _ = self.leave_room();
        }
        self.disconnect().await;
        self.pose.despawn_all();
        self.flush();
        self.bus.clear();
        info!("🛑 Room client shut down");
    }

    // ------------------------------------------------------------------
    // Session operations
    // ------------------------------------------------------------------

    pub fn create_room(&mut self, zone: Zone, name: &str) -> Result<RoomCode, DomainError> {
        let result = self.session.create_room(&self.transport, zone, name);
        self.finish_call(result)
    }

    pub fn join_room(&mut self, code: &str) -> Result<RoomCode, DomainError> {
        let result = self.session.join_room(&self.transport, code);
        self.finish_call(result)
    }

    pub fn leave_room(&mut self) -> Result<(), DomainError> {
        let result = self.session.leave_room(&self.transport);
        self.finish_call(result)
    }

    pub fn request_room_list(&mut self) -> Result<(), DomainError> {
        let result = self.session.request_room_list(&self.transport);
        self.finish_call(result)
    }

    pub fn teleport_to_zone(&mut self, zone: Zone) -> Result<(), DomainError> {
        let result = self.session.teleport_to_zone(&self.transport, zone);
        self.finish_call(result)
    }

    pub fn set_display_name(&mut self, name: &str) -> Result<(), DomainError> {
        let result = self.session.set_display_name(&self.transport, name);
        self.finish_call(result)
    }

    fn finish_call<T>(&mut self, result: Result<T, DomainError>) -> Result<T, DomainError> {
        if let Err(e) = &result {
            warn!("🚫 {}", e);
            self.pending.push(ClientEvent::RoomError(e.to_string()));
        }
        self.collect_session_events();
        self.publish_pending();
        result
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advances the client by one frame of `dt`.
    pub fn tick(&mut self, dt: Duration) {
        self.ticks += 1;

        for envelope in self.transport.pump() {
            self.dispatch(&envelope);
        }
        self.collect_transport_events();

        self.pose.complete_local_spawn();
        self.pending.extend(self.pose.drain_events());

        self.send_local_pose(dt);
        self.pose.interpolate(dt);

        self.publish_pending();
    }

    fn dispatch(&mut self, envelope: &Envelope) {
        let Some(inbound) = self.router.route(envelope) else {
            return;
        };
        match inbound.subsystem() {
            Subsystem::Transport => debug!("🤝 Ignoring '{}' after handshake", envelope.message_type),
            Subsystem::Pose => {
                if let Inbound::Pose(packet) = &inbound {
                    if Some(&packet.player_id) == self.transport.local_id() {
                        trace!("🔁 Ignoring echo of own pose");
                    } else if self.session.record_pose(packet) {
                        self.collect_session_events();
                        self.pose.apply_packet(packet);
                    } else {
                        trace!("📭 Pose from {} outside roster", packet.player_id);
                    }
                }
            }
            Subsystem::Session => {
                let local_id = self.transport.local_id().cloned();
                self.session.handle(local_id.as_ref(), &inbound);
                self.collect_session_events();
            }
        }
    }

    fn collect_transport_events(&mut self) {
        for event in self.transport.drain_events() {
            match event {
                TransportEvent::Connected(local_id) => {
                    self.pending.push(ClientEvent::Connected { local_id });
                }
                TransportEvent::Disconnected => {
                    self.pending.push(ClientEvent::Disconnected);
                    self.session.on_disconnected();
                    self.collect_session_events();
                }
                TransportEvent::ConnectionError(message) => {
                    self.pending.push(ClientEvent::ConnectionError(message));
                }
            }
        }
    }

    /// Moves session events to the outbox, letting the pose engine react first.
    fn collect_session_events(&mut self) {
        for event in self.session.drain_events() {
            self.react(&event);
            self.pending.push(event);
            self.pending.extend(self.pose.drain_events());
        }
    }

    fn react(&mut self, event: &ClientEvent) {
        match event {
            ClientEvent::RoomCreated(_) | ClientEvent::RoomJoined(_) => {
                self.pose.reset_filter();
                self.pose.set_local_zone(self.session.local_zone());
                self.pose.request_local_spawn();
            }
            ClientEvent::RoomLeft => self.pose.despawn_all(),
            ClientEvent::PlayerJoined(player) => {
                self.pose.spawn_remote(player);
            }
            ClientEvent::PlayerLeft(id) => {
                self.pose.despawn_remote(id);
            }
            ClientEvent::ZoneChanged { player_id, zone } => {
                if Some(player_id) == self.transport.local_id() {
                    self.pose.set_local_zone(*zone);
                } else {
                    self.pose.set_remote_zone(player_id, *zone);
                }
            }
            _ => {}
        }
    }

    fn send_local_pose(&mut self, dt: Duration) {
        if !self.session.is_in_room() {
            return;
        }
        let Some(local_id) = self.transport.local_id().cloned() else {
            return;
        };
        let transport = &self.transport;
        self.pose
            .sample(dt, &local_id, |packet| transport.send(&Outbound::Pose(packet.clone())));
    }

    fn flush(&mut self) {
        self.collect_transport_events();
        self.publish_pending();
    }

    fn publish_pending(&mut self) {
        for event in self.pending.drain(..) {
            self.bus.publish(event);
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn local_id(&self) -> Option<&PlayerId> {
        self.transport.local_id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn current_room_id(&self) -> Option<&RoomCode> {
        self.session.current_room_id()
    }

    pub fn players(&self) -> Vec<&Player> {
        self.session.players()
    }

    pub fn rooms(&self) -> &[RoomDirectoryEntry] {
        self.session.directory().entries()
    }

    pub fn display_name(&self) -> &str {
        self.session.display_name()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn pose(&self) -> &PoseSyncEngine {
        &self.pose
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }
}
