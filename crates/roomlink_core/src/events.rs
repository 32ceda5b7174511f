//! # Client Events and Publish/Subscribe
//!
//! Domain events raised by the client core, and the [`EventBus`] that delivers them
//! to collaborators (UI, rendering, the binary's logger).
//!
//! Each subscriber receives its own FIFO queue. Subscriptions are explicit: every
//! [`Subscription`] carries an id that must be handed back to
//! [`EventBus::unsubscribe`] on teardown. A subscription whose receiver was dropped
//! without unsubscribing is pruned on the next publish so a reconnect cycle never
//! accumulates dead handlers.

use crate::session::{Player, RoomCode, RoomDirectoryEntry};
use crate::types::{PlayerId, Zone};
use std::collections::BTreeMap;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

/// Every observable state change of the client core.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Handshake completed; the server assigned this id
    Connected { local_id: PlayerId },
    Disconnected,
    ConnectionError(String),

    RoomCreated(RoomCode),
    RoomJoined(RoomCode),
    RoomLeft,
    RoomError(String),
    RoomListUpdated(Vec<RoomDirectoryEntry>),

    PlayerJoined(Player),
    PlayerLeft(PlayerId),
    /// Roster entry changed in place (e.g. display name)
    PlayerUpdated(Player),
    /// A participant (possibly the local one) moved to another zone
    ZoneChanged { player_id: PlayerId, zone: Zone },

    LocalParticipantSpawned,
    RemoteParticipantSpawned(PlayerId),
    RemoteParticipantDespawned(PlayerId),
}

impl ClientEvent {
    /// Short stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Connected { .. } => "connected",
            ClientEvent::Disconnected => "disconnected",
            ClientEvent::ConnectionError(_) => "connection_error",
            ClientEvent::RoomCreated(_) => "room_created",
            ClientEvent::RoomJoined(_) => "room_joined",
            ClientEvent::RoomLeft => "room_left",
            ClientEvent::RoomError(_) => "room_error",
            ClientEvent::RoomListUpdated(_) => "room_list_updated",
            ClientEvent::PlayerJoined(_) => "player_joined",
            ClientEvent::PlayerLeft(_) => "player_left",
            ClientEvent::PlayerUpdated(_) => "player_updated",
            ClientEvent::ZoneChanged { .. } => "zone_changed",
            ClientEvent::LocalParticipantSpawned => "local_participant_spawned",
            ClientEvent::RemoteParticipantSpawned(_) => "remote_participant_spawned",
            ClientEvent::RemoteParticipantDespawned(_) => "remote_participant_despawned",
        }
    }
}

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: UnboundedReceiver<ClientEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the next queued event without waiting.
    pub fn try_next(&mut self) -> Option<ClientEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drains everything queued so far.
    pub fn drain(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Waits for the next event. Returns `None` once unsubscribed.
    pub async fn next(&mut self) -> Option<ClientEvent> {
        self.receiver.recv().await
    }
}

/// Fan-out publisher for [`ClientEvent`]s.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: BTreeMap<SubscriptionId, UnboundedSender<ClientEvent>>,
    next_id: u64,
    published: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Subscription {
        let (sender, receiver) = unbounded_channel();
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.insert(id, sender);
        debug!("🔔 Subscriber {:?} registered", id);
        Subscription { id, receiver }
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!("🔕 Subscriber {:?} removed", id);
        }
        removed
    }

    /// Delivers an event to every live subscriber in subscription order.
    pub fn publish(&mut self, event: ClientEvent) {
        self.published += 1;
        trace!("📣 Publishing {}", event.name());
        self.subscribers
            .retain(|id, sender| match sender.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!("🧹 Pruning dropped subscriber {:?}", id);
                    false
                }
            });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn published_count(&self) -> u64 {
        self.published
    }

    /// Drops every subscription; pending receivers observe end-of-stream.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}
