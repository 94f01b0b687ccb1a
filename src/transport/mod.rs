// ABOUTME: Transport module for the persistent bidirectional channel to the backend
// Defines the seams the session drives (Connector, Transport) and their websocket implementation

pub mod discovery;
pub mod protocol;
pub mod websocket_client;

pub use discovery::TransportDiscovery;
pub use protocol::{ConnectionStatus, InboundMessage, MessageCode, WireMessage};
pub use websocket_client::{WebSocketConnector, WebSocketTransport};

use crate::session::error::SessionError;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

/// Identifies one connection attempt. Events from older attempts are stale.
pub type AttemptId = u64;

/// An open (or formerly open) channel owned by the session
pub trait Transport: Send {
    fn is_open(&self) -> bool;

    /// Write one text frame. Never buffers for later delivery.
    fn send_text(&mut self, text: String) -> Result<(), SessionError>;
}

/// Lifecycle and data events reported by a transport
pub enum TransportEvent {
    /// The channel is open; ownership of the transport moves to the session
    Opened(Box<dyn Transport>),
    Message(String),
    Error(Option<String>),
    Closed,
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportEvent::Opened(_) => f.write_str("Opened"),
            TransportEvent::Message(text) => f.debug_tuple("Message").field(text).finish(),
            TransportEvent::Error(detail) => f.debug_tuple("Error").field(detail).finish(),
            TransportEvent::Closed => f.write_str("Closed"),
        }
    }
}

/// A transport event tagged with the attempt that produced it
#[derive(Debug)]
pub struct TaggedEvent {
    pub attempt: AttemptId,
    pub event: TransportEvent,
}

pub type EventSender = mpsc::UnboundedSender<TaggedEvent>;

/// Opens channels to the backend.
///
/// `connect` resolves once setup has either failed or the channel is open. On
/// success the connector must deliver `TransportEvent::Opened` before any other
/// event of that attempt, and `TransportEvent::Closed` when the channel ends.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, attempt: AttemptId, events: EventSender) -> Result<(), SessionError>;
}
