// ABOUTME: WebSocket transport to the Elisa backend
// Discovers the endpoint, performs the handshake and pumps frames as tagged transport events

use crate::session::error::SessionError;
use crate::transport::{
    AttemptId, Connector, EventSender, TaggedEvent, Transport, TransportDiscovery, TransportEvent,
};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite};
use tracing::{debug, error, info, warn};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects by asking the discovery endpoint for a URL, then opening a websocket to it
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    discovery: TransportDiscovery,
    handshake_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(discovery: TransportDiscovery) -> Self {
        Self {
            discovery,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, attempt: AttemptId, events: EventSender) -> Result<(), SessionError> {
        let url = self.discovery.fetch_url().await?;
        WebSocketTransport::open_with_timeout(&url, attempt, events, self.handshake_timeout).await
    }
}

/// Handle to an open websocket. Dropping it abandons the channel: both pump
/// tasks are aborted and no further events are reported for its attempt.
pub struct WebSocketTransport {
    outgoing: mpsc::UnboundedSender<tungstenite::Message>,
    open: Arc<AtomicBool>,
    send_task: JoinHandle<()>,
    receive_task: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Perform the handshake and hand the transport to the session through
    /// `TransportEvent::Opened`, followed by inbound frames and a final `Closed`.
    pub async fn open(url: &str, attempt: AttemptId, events: EventSender) -> Result<(), SessionError> {
        Self::open_with_timeout(url, attempt, events, HANDSHAKE_TIMEOUT).await
    }

    /// Like `open`, giving up on the handshake after `handshake_timeout`
    pub async fn open_with_timeout(
        url: &str,
        attempt: AttemptId,
        events: EventSender,
        handshake_timeout: Duration,
    ) -> Result<(), SessionError> {
        info!("Opening websocket to {} (attempt {})", url, attempt);

        let (ws_stream, response) = timeout(handshake_timeout, connect_async(url))
            .await
            .map_err(|_| {
                error!("WebSocket handshake with {} timed out", url);
                SessionError::Handshake(format!("timed out after {handshake_timeout:?}"))
            })?
            .map_err(|e| {
                error!("WebSocket handshake with {} failed: {}", url, e);
                SessionError::Handshake(e.to_string())
            })?;

        debug!("WebSocket response status: {:?}", response.status());

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<tungstenite::Message>();
        let open = Arc::new(AtomicBool::new(true));

        let send_open = open.clone();
        let send_task = tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    error!("Failed to send WebSocket message: {}", e);
                    send_open.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        // The receive loop waits until the session owns the transport, so
        // `Opened` is always the first event of this attempt.
        let (start_tx, start_rx) = oneshot::channel::<()>();
        let receive_open = open.clone();
        let receive_events = events.clone();
        let receive_task = tokio::spawn(async move {
            if start_rx.await.is_err() {
                return;
            }

            let emit = |event| {
                receive_events
                    .send(TaggedEvent { attempt, event })
                    .is_ok()
            };

            while let Some(ws_msg) = ws_receiver.next().await {
                match ws_msg {
                    Ok(tungstenite::Message::Text(text)) => {
                        if !emit(TransportEvent::Message(text.as_str().to_owned())) {
                            break;
                        }
                    }
                    Ok(tungstenite::Message::Close(frame)) => {
                        info!("WebSocket closed by server: {:?}", frame);
                        break;
                    }
                    Ok(_) => {
                        // Binary, Ping, Pong and raw frames carry nothing for the chat
                    }
                    Err(e) => {
                        warn!("WebSocket error: {}", e);
                        emit(TransportEvent::Error(Some(e.to_string())));
                        break;
                    }
                }
            }

            receive_open.store(false, Ordering::SeqCst);
            emit(TransportEvent::Closed);
        });

        let transport = Self {
            outgoing: outgoing_tx,
            open,
            send_task,
            receive_task,
        };

        if events
            .send(TaggedEvent {
                attempt,
                event: TransportEvent::Opened(Box::new(transport)),
            })
            .is_err()
        {
            return Err(SessionError::Transport("session is no longer running".into()));
        }

        let _ = start_tx.send(());
        Ok(())
    }
}

impl Transport for WebSocketTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        if !self.is_open() {
            return Err(SessionError::Transport("websocket is closed".into()));
        }

        self.outgoing
            .send(tungstenite::Message::text(text))
            .map_err(|e| SessionError::Transport(format!("failed to queue frame: {e}")))
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        self.send_task.abort();
        self.receive_task.abort();
    }
}
