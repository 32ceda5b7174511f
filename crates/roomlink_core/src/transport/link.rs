//! Byte-moving bridge between a socket and the tick loop.
//!
//! A [`Link`] owns two background tasks: a reader that forwards every text frame
//! into an inbound queue, and a writer that drains an outbound queue into the
//! socket. Neither task looks at message contents. All interpretation happens when
//! the tick loop drains the inbound queue, so handlers never run concurrently.

use crate::messaging::Envelope;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{
    error::TryRecvError, unbounded_channel, UnboundedReceiver, UnboundedSender,
};
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{debug, trace, warn};

/// Something the reader observed on the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Text(String),
    /// The socket closed, with the peer's reason if it gave one
    Closed(Option<String>),
}

/// Client end of an open connection.
#[derive(Debug)]
pub struct Link {
    outbound: UnboundedSender<String>,
    inbound: UnboundedReceiver<LinkEvent>,
    tasks: Vec<JoinHandle<()>>,
    closed_seen: bool,
}

impl Link {
    /// Bridges an established WebSocket stream.
    pub fn websocket<S>(stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_sender, mut ws_receiver) = stream.split();
        let (out_tx, mut out_rx) = unbounded_channel::<String>();
        let (in_tx, in_rx) = unbounded_channel::<LinkEvent>();

        let writer = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                    warn!("❌ Failed to write frame: {}", e);
                    break;
                }
            }
            let _ = ws_sender.close().await;
            debug!("✍️ Writer task finished");
        });

        let reader = tokio::spawn(async move {
            let reason = loop {
                match ws_receiver.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if in_tx.send(LinkEvent::Text(text.as_str().to_owned())).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => {
                            if in_tx.send(LinkEvent::Text(text)).is_err() {
                                return;
                            }
                        }
                        Err(_) => warn!("⚠️ Dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.as_str().to_owned());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                }
            };
            let _ = in_tx.send(LinkEvent::Closed(reason));
            debug!("📖 Reader task finished");
        });

        Self {
            outbound: out_tx,
            inbound: in_rx,
            tasks: vec![writer, reader],
            closed_seen: false,
        }
    }

    /// In-process link paired with a [`MemoryPeer`] playing the server.
    pub fn memory() -> (Self, MemoryPeer) {
        let (out_tx, out_rx) = unbounded_channel();
        let (in_tx, in_rx) = unbounded_channel();
        let link = Self {
            outbound: out_tx,
            inbound: in_rx,
            tasks: Vec::new(),
            closed_seen: false,
        };
        let peer = MemoryPeer {
            to_client: in_tx,
            from_client: out_rx,
        };
        (link, peer)
    }

    /// Queues a frame for the writer. Returns `false` if the writer is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    /// Next queued event without waiting.
    ///
    /// A reader that vanished without reporting a close is surfaced as one
    /// `Closed(None)`.
    pub fn try_next(&mut self) -> Option<LinkEvent> {
        if self.closed_seen {
            return None;
        }
        match self.inbound.try_recv() {
            Ok(event) => {
                if matches!(event, LinkEvent::Closed(_)) {
                    self.closed_seen = true;
                }
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed_seen = true;
                Some(LinkEvent::Closed(None))
            }
        }
    }

    /// Waits for the next event. Used only during the handshake.
    pub async fn next(&mut self) -> Option<LinkEvent> {
        if self.closed_seen {
            return None;
        }
        let event = self.inbound.recv().await;
        if matches!(event, None | Some(LinkEvent::Closed(_))) {
            self.closed_seen = true;
        }
        event
    }

    /// Flushes queued frames, closes the socket and stops both tasks.
    pub async fn close(mut self, grace: Duration) {
        let tasks = std::mem::take(&mut self.tasks);
        // dropping the sender lets the writer drain and close the socket
        drop(self);
        for task in tasks {
            if tokio::time::timeout(grace, task).await.is_err() {
                trace!("⏱️ Link task did not finish within {:?}", grace);
            }
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Server end of a [`Link::memory`] pair.
#[derive(Debug)]
pub struct MemoryPeer {
    to_client: UnboundedSender<LinkEvent>,
    from_client: UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Delivers an envelope to the client.
    pub fn push(&self, envelope: &Envelope) -> bool {
        match envelope.encode() {
            Ok(text) => self.push_text(text),
            Err(_) => false,
        }
    }

    /// Delivers a raw frame, well-formed or not.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.to_client.send(LinkEvent::Text(text.into())).is_ok()
    }

    /// Closes the connection from the server side.
    pub fn close(&self, reason: Option<&str>) -> bool {
        self.to_client
            .send(LinkEvent::Closed(reason.map(str::to_owned)))
            .is_ok()
    }

    /// Everything the client sent since the last call, decoded.
    pub fn sent(&mut self) -> Vec<Envelope> {
        let mut sent = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            match Envelope::decode(&text) {
                Ok(envelope) => sent.push(envelope),
                Err(e) => warn!("⚠️ Client sent undecodable frame: {}", e),
            }
        }
        sent
    }
}
