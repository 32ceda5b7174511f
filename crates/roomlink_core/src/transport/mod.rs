//! # Transport
//!
//! Owns the single connection to the relay server: opening it, completing the
//! `welcome` handshake, framing [`Envelope`]s, and scheduling reconnects after an
//! unexpected close.
//!
//! The transport never interprets payloads. Inbound frames are buffered by the
//! [`Link`] tasks and handed out in arrival order by [`Transport::pump`], which the
//! client calls once per tick.

pub mod link;
pub mod reconnect;

pub use link::{Link, LinkEvent, MemoryPeer};
pub use reconnect::ReconnectTimer;

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::messaging::types::WelcomePayload;
use crate::messaging::{message_type, Envelope, Outbound};
use crate::types::PlayerId;
use std::cell::Cell;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Connection-level change for the client to translate into public events.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected(PlayerId),
    Disconnected,
    ConnectionError(String),
}

/// Outbound half of the transport as seen by the session layer.
pub trait MessageSink {
    fn is_connected(&self) -> bool;

    fn local_id(&self) -> Option<&PlayerId>;

    /// Sends one message. Returns `false` (after logging) if it could not be queued.
    fn send(&self, message: &Outbound) -> bool;
}

/// The client's connection to the server.
#[derive(Debug)]
pub struct Transport {
    config: TransportConfig,
    state: ConnectionState,
    url: Option<String>,
    local_id: Option<PlayerId>,
    link: Option<Link>,
    auto_reconnect: bool,
    reconnect: ReconnectTimer,
    events: Vec<TransportEvent>,
    sent: Cell<u64>,
    received: u64,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        let auto_reconnect = config.auto_reconnect;
        Self {
            config,
            state: ConnectionState::Disconnected,
            url: None,
            local_id: None,
            link: None,
            auto_reconnect,
            reconnect: ReconnectTimer::new(),
            events: Vec::new(),
            sent: Cell::new(0),
            received: 0,
        }
    }

    /// Opens a WebSocket connection and waits for the server-assigned id.
    pub async fn connect(&mut self, url: &str) -> Result<PlayerId, TransportError> {
        if let (ConnectionState::Connected, Some(id)) = (self.state, self.local_id.as_ref()) {
            warn!("🔌 Already connected as {}, ignoring connect request", id);
            return Ok(id.clone());
        }

        self.url = Some(url.to_string());
        self.begin_attempt();
        info!("🔌 Connecting to {}", url);

        let timeout = self.config.handshake_timeout;
        let opened = match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
            Err(_) => Err(TransportError::Timeout(timeout.as_millis() as u64)),
            Ok(Err(e)) => Err(TransportError::Connect(e.to_string())),
            Ok(Ok((stream, _response))) => Ok(Link::websocket(stream)),
        };

        match opened {
            Ok(link) => self.establish(link).await,
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Adopts an already open link (in-process peers, custom sockets).
    pub async fn connect_link(&mut self, link: Link) -> Result<PlayerId, TransportError> {
        if self.link.is_some() {
            self.drop_link().await;
        }
        self.begin_attempt();
        self.establish(link).await
    }

    fn begin_attempt(&mut self) {
        self.auto_reconnect = self.config.auto_reconnect;
        self.reconnect.cancel();
        self.state = ConnectionState::Connecting;
    }

    async fn establish(&mut self, mut link: Link) -> Result<PlayerId, TransportError> {
        let timeout = self.config.handshake_timeout;
        let handshake = match tokio::time::timeout(timeout, await_welcome(&mut link)).await {
            Err(_) => Err(TransportError::Timeout(timeout.as_millis() as u64)),
            Ok(result) => result,
        };

        match handshake {
            Ok(id) => {
                info!("✅ Connected as {}", id);
                self.link = Some(link);
                self.local_id = Some(id.clone());
                self.state = ConnectionState::Connected;
                self.reconnect.reset();
                self.events.push(TransportEvent::Connected(id.clone()));
                Ok(id)
            }
            Err(e) => {
                link.close(CLOSE_GRACE).await;
                Err(self.fail(e))
            }
        }
    }

    fn fail(&mut self, err: TransportError) -> TransportError {
        error!("❌ Connection attempt failed: {}", err);
        self.state = ConnectionState::Disconnected;
        self.local_id = None;
        self.events.push(TransportEvent::ConnectionError(err.to_string()));
        self.schedule_reconnect();
        err
    }

    fn schedule_reconnect(&mut self) {
        if !self.auto_reconnect {
            return;
        }
        self.reconnect.arm(Instant::now(), self.config.reconnect_delay);
        info!(
            "🔄 Reconnect attempt {} scheduled in {:?}",
            self.reconnect.attempts(),
            self.config.reconnect_delay
        );
    }

    /// Drains every frame received since the last call, in arrival order.
    ///
    /// Frames that are not valid envelopes are logged and skipped. A close observed
    /// here clears the local id, raises `Disconnected` and, when enabled, arms the
    /// reconnect timer.
    pub fn pump(&mut self) -> Vec<Envelope> {
        let mut inbound = Vec::new();
        let mut closed = None;

        if let Some(link) = self.link.as_mut() {
            while let Some(event) = link.try_next() {
                match event {
                    LinkEvent::Text(text) => match Envelope::decode(&text) {
                        Ok(envelope) => {
                            self.received += 1;
                            inbound.push(envelope);
                        }
                        Err(e) => warn!("⚠️ Dropping undecodable frame: {}", e),
                    },
                    LinkEvent::Closed(reason) => {
                        closed = Some(reason);
                        break;
                    }
                }
            }
        }

        if let Some(reason) = closed {
            self.handle_remote_close(reason);
        }
        inbound
    }

    fn handle_remote_close(&mut self, reason: Option<String>) {
        warn!(
            "🔌 Connection closed by server: {}",
            reason.as_deref().unwrap_or("no reason given")
        );
        self.link = None;
        self.local_id = None;
        self.state = ConnectionState::Disconnected;
        self.events.push(TransportEvent::Disconnected);
        self.schedule_reconnect();
    }

    pub fn reconnect_due(&self, now: Instant) -> bool {
        self.state == ConnectionState::Disconnected && self.reconnect.is_due(now)
    }

    /// Retries the last URL passed to [`Transport::connect`].
    pub async fn reconnect(&mut self) -> Result<PlayerId, TransportError> {
        self.reconnect.cancel();
        let url = self.url.clone().ok_or(TransportError::MissingUrl)?;
        self.connect(&url).await
    }

    /// Closes the connection on request. Auto-reconnect stays off until the next
    /// explicit connect.
    pub async fn disconnect(&mut self) {
        self.auto_reconnect = false;
        self.reconnect.cancel();
        self.drop_link().await;
        self.state = ConnectionState::Disconnected;
        self.local_id = None;
        self.events.push(TransportEvent::Disconnected);
        info!("👋 Disconnected");
    }

    async fn drop_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.close(CLOSE_GRACE).await;
        }
    }

    pub fn drain_events(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn reconnect_timer(&self) -> &ReconnectTimer {
        &self.reconnect
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.get()
    }

    pub fn received_count(&self) -> u64 {
        self.received
    }
}

impl MessageSink for Transport {
    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.link.is_some()
    }

    fn local_id(&self) -> Option<&PlayerId> {
        self.local_id.as_ref()
    }

    fn send(&self, message: &Outbound) -> bool {
        let (Some(link), Some(id), true) = (
            self.link.as_ref(),
            self.local_id.as_ref(),
            self.state == ConnectionState::Connected,
        ) else {
            warn!("🚫 Socket not open, dropping '{}'", message.message_type());
            return false;
        };

        let text = match message.to_envelope(id.as_str()).and_then(|env| env.encode()) {
            Ok(text) => text,
            Err(e) => {
                error!("❌ {}", e);
                return false;
            }
        };

        if !link.send_text(text) {
            warn!("🚫 Writer closed, dropping '{}'", message.message_type());
            return false;
        }
        self.sent.set(self.sent.get() + 1);
        debug!("📤 Sent '{}'", message.message_type());
        true
    }
}

async fn await_welcome(link: &mut Link) -> Result<PlayerId, TransportError> {
    let text = match link.next().await {
        Some(LinkEvent::Text(text)) => text,
        Some(LinkEvent::Closed(reason)) => {
            return Err(TransportError::Handshake(format!(
                "closed before welcome ({})",
                reason.as_deref().unwrap_or("no reason given")
            )))
        }
        None => return Err(TransportError::Handshake("closed before welcome".to_string())),
    };

    let envelope = Envelope::decode(&text).map_err(|e| TransportError::Handshake(e.to_string()))?;
    if envelope.message_type != message_type::WELCOME {
        return Err(TransportError::Handshake(format!(
            "expected '{}', got '{}'",
            message_type::WELCOME,
            envelope.message_type
        )));
    }
    let welcome: WelcomePayload = envelope
        .payload()
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    if !welcome.client_id.is_valid() {
        return Err(TransportError::Handshake("welcome carried an empty client id".to_string()));
    }
    Ok(welcome.client_id)
}

/// Builds the `welcome` frame a server sends first.
pub fn welcome_envelope(client_id: &PlayerId) -> Envelope {
    Envelope {
        message_type: message_type::WELCOME.to_string(),
        sender_id: String::new(),
        data: serde_json::json!({ "clientId": client_id.as_str() }).to_string(),
    }
}
