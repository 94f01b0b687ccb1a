// ABOUTME: Chat session store synchronizing the local message log with the backend
// Owns the connection status, the transport and the log; every mutation is persisted and published

use crate::i18n::{translate, Localizer};
use crate::models::{ChatMessage, MessageKind, MessageLog, Upsert};
use crate::quiz::QuizSink;
use crate::session::error::SessionError;
use crate::session::persistence::MessagePersistence;
use crate::transport::protocol::{self, ConnectionStatus, InboundMessage, WireMessage};
use crate::transport::{AttemptId, Transport, TransportEvent};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Timing and greeting used by the store
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Hidden message sent right after the channel opens so the agent greets first
    pub greeting: String,
    /// Retry delay after an established connection was lost
    pub reconnect_delay: Duration,
    /// Retry delay after discovery or channel setup failed
    pub discovery_retry_delay: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            greeting: "Hi!".to_string(),
            reconnect_delay: Duration::from_secs(5),
            discovery_retry_delay: Duration::from_secs(10),
        }
    }
}

/// What the caller has to do after `begin_connect`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStep {
    /// History was reset, no networking for this call
    ResetOnly,
    /// Discover the endpoint and open a channel for this attempt
    Discover { attempt: AttemptId },
}

pub struct ChatStore {
    log: MessageLog,
    status: ConnectionStatus,
    transport: Option<Box<dyn Transport>>,
    attempt: AttemptId,
    persistence: MessagePersistence,
    localizer: Localizer,
    quiz: Option<Arc<dyn QuizSink>>,
    settings: StoreSettings,
    messages_tx: watch::Sender<Vec<ChatMessage>>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ChatStore {
    /// Create the store, restoring the previous message log from storage
    pub fn new(persistence: MessagePersistence, localizer: Localizer, settings: StoreSettings) -> Self {
        let log = persistence.restore();
        let (messages_tx, _) = watch::channel(log.messages().to_vec());
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);

        Self {
            log,
            status: ConnectionStatus::Disconnected,
            transport: None,
            attempt: 0,
            persistence,
            localizer,
            quiz: None,
            settings,
            messages_tx,
            status_tx,
        }
    }

    /// Injection point for the quiz collaborator
    pub fn set_quiz_sink(&mut self, quiz: Arc<dyn QuizSink>) {
        self.quiz = Some(quiz);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.log.messages()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn current_attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn is_transport_open(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_open())
    }

    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.messages_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    // ============================================
    // Connection lifecycle
    // ============================================

    /// Entry point of every (re)connect. With `reset` the history is cleared
    /// and nothing else happens; otherwise a new attempt supersedes any
    /// previous transport.
    pub fn begin_connect(&mut self, reset: bool) -> ConnectStep {
        if reset {
            self.reset_history();
            return ConnectStep::ResetOnly;
        }

        if self.transport.take().is_some() {
            debug!("Abandoning transport of attempt {}", self.attempt);
        }

        self.attempt += 1;
        self.set_status(ConnectionStatus::Connecting);
        info!("Starting connection attempt {}", self.attempt);

        ConnectStep::Discover { attempt: self.attempt }
    }

    /// Discovery or channel setup failed. Returns the delay of the retry to schedule.
    ///
    /// A refused handshake happens after the URL was found, so it is reported
    /// like a socket error followed by a close.
    pub fn connect_failed(&mut self, attempt: AttemptId, error: &SessionError) -> Option<Duration> {
        if self.is_stale(attempt) {
            return None;
        }

        if let SessionError::Handshake(_) = error {
            warn!("Connection attempt {} was refused: {}", attempt, error);
            self.handle_transport_error(Some(error.to_string()));
            return Some(self.transport_closed());
        }

        error!("Connection attempt {} failed: {}", attempt, error);
        self.transport = None;
        self.set_status(ConnectionStatus::Disconnected);

        let fetch_url = self.localizer.strings().fetch_url;
        self.append(ChatMessage::error(format!("{fetch_url} {error}")));

        Some(self.settings.discovery_retry_delay)
    }

    /// Apply one transport event. Returns the delay of the retry to schedule, if any.
    pub fn handle_transport_event(&mut self, attempt: AttemptId, event: TransportEvent) -> Option<Duration> {
        if self.is_stale(attempt) {
            return None;
        }

        match event {
            TransportEvent::Opened(transport) => {
                self.transport_opened(transport);
                None
            }
            TransportEvent::Message(text) => {
                self.handle_frame(&text);
                None
            }
            TransportEvent::Error(detail) => {
                self.handle_transport_error(detail);
                None
            }
            TransportEvent::Closed => Some(self.transport_closed()),
        }
    }

    fn is_stale(&self, attempt: AttemptId) -> bool {
        if attempt == self.attempt {
            return false;
        }
        debug!("Ignoring event of stale attempt {} (current {})", attempt, self.attempt);
        true
    }

    fn transport_opened(&mut self, transport: Box<dyn Transport>) {
        info!("Connected to backend (attempt {})", self.attempt);
        self.transport = Some(transport);
        self.set_status(ConnectionStatus::Connected);

        let greeting = self.settings.greeting.clone();
        self.send_chat_message(&greeting, true);
    }

    fn transport_closed(&mut self) -> Duration {
        let connection_lost = self.localizer.strings().connection_lost;
        warn!("{}", connection_lost);

        self.transport = None;
        self.append(ChatMessage::status(connection_lost));
        self.set_status(ConnectionStatus::ConnectionLost);

        self.settings.reconnect_delay
    }

    /// Socket errors only produce a visible entry; the close event that
    /// follows drives the status.
    fn handle_transport_error(&mut self, detail: Option<String>) {
        let text = detail
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.localizer.strings().unknown_error.to_string());
        self.append(ChatMessage::error(text));
    }

    // ============================================
    // Inbound dispatch
    // ============================================

    /// Parse and dispatch one inbound text frame. Failures become error entries.
    pub fn handle_frame(&mut self, text: &str) {
        let inbound = WireMessage::parse(text).and_then(|envelope| InboundMessage::from_envelope(&envelope));

        match inbound {
            Ok(message) => self.dispatch(message),
            Err(e) => {
                warn!("Dropping inbound message: {}", e);
                self.append(ChatMessage::error(e.to_string()));
            }
        }
    }

    pub fn dispatch(&mut self, message: InboundMessage) {
        debug!("Dispatching {:?}", message);

        match message {
            InboundMessage::ChatReply { id, text, kind } => self.handle_chat_reply(&id, text, kind),
            InboundMessage::Quiz { data } => self.handle_quiz(data),
            InboundMessage::ServerError { text } => self.handle_server_error(text),
            InboundMessage::Unknown { code } => {
                let code = code.unwrap_or_else(|| "(none)".to_string());
                let template = self.localizer.strings().unknown_message_code;
                self.append(ChatMessage::error(translate(template, &[("code", code.as_str())])));
            }
        }
    }

    fn handle_chat_reply(&mut self, id: &str, text: String, kind: MessageKind) {
        match self.log.upsert_agent(id, text, kind) {
            Upsert::Updated(index) => debug!("Updated agent message {} at {}", id, index),
            Upsert::Appended(index) => debug!("Appended agent message {} at {}", id, index),
        }
        self.commit_log();
    }

    fn handle_quiz(&self, data: Option<Value>) {
        let Some(data) = data else {
            debug!("Ignoring quiz message without data");
            return;
        };

        match &self.quiz {
            Some(quiz) => quiz.update_from_backend(data),
            None => warn!("Quiz payload received before a quiz store was wired"),
        }
    }

    fn handle_server_error(&mut self, text: Option<String>) {
        let text = text.unwrap_or_else(|| self.localizer.strings().unknown_error.to_string());
        self.append(ChatMessage::error(text));
    }

    // ============================================
    // Outbound
    // ============================================

    /// Send user input to the backend. Hidden messages go over the wire but
    /// are not added to the visible log.
    pub fn send_chat_message(&mut self, text: &str, hidden: bool) {
        let language = self.localizer.language();

        if !hidden {
            self.append(ChatMessage::user(text, language));
        }

        self.send("chat_input", protocol::chat_input(text, language));
    }

    /// Write `{code, ...data}` to the transport if it is open. Otherwise the
    /// message is dropped and a "not connected" error entry is added.
    pub fn send(&mut self, code: &str, data: Map<String, Value>) {
        let result = match self.transport.as_mut() {
            Some(transport) if transport.is_open() => WireMessage::new(code, data)
                .to_json()
                .map_err(SessionError::from)
                .and_then(|json| transport.send_text(json)),
            _ => Err(SessionError::Transport("not connected".into())),
        };

        if let Err(e) = result {
            warn!("Dropping outbound '{}' message: {}", code, e);
            let template = self.localizer.strings().not_connected;
            self.append(ChatMessage::error(translate(template, &[("code", code)])));
        } else {
            debug!("Sent '{}' message", code);
        }
    }

    // ============================================
    // Message log
    // ============================================

    /// Clear the log and persist the empty log. The transport is left alone.
    pub fn reset_history(&mut self) {
        info!("Resetting chat history");
        self.log.clear();
        self.commit_log();
    }

    fn append(&mut self, message: ChatMessage) {
        self.log.append(message);
        self.commit_log();
    }

    fn commit_log(&mut self) {
        if let Err(e) = self.persistence.save(&self.log) {
            warn!("Failed to persist chat messages: {}", e);
        }
        self.messages_tx.send_replace(self.log.messages().to_vec());
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            debug!("Connection status {} -> {}", self.status, status);
        }
        self.status = status;
        self.status_tx.send_replace(status);
    }
}
